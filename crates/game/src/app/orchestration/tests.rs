    use super::*;
    use engine::SessionMeta;

    struct IdleForever;

    impl Script<StageWorld, ()> for IdleForever {
        fn resume(
            &mut self,
            _cx: &mut ScriptCx<'_, StageWorld, ()>,
        ) -> Result<Step<StageWorld>, TaskFault> {
            Ok(Step::Yield(Wait::NextFrame))
        }
    }

    struct FinishNow;

    impl Script<StageWorld, ()> for FinishNow {
        fn resume(
            &mut self,
            _cx: &mut ScriptCx<'_, StageWorld, ()>,
        ) -> Result<Step<StageWorld>, TaskFault> {
            Ok(Step::Done)
        }
    }

    struct AddScoreOnce {
        amount: u64,
    }

    impl Script<StageWorld, ()> for AddScoreOnce {
        fn resume(
            &mut self,
            cx: &mut ScriptCx<'_, StageWorld, ()>,
        ) -> Result<Step<StageWorld>, TaskFault> {
            cx.world().score.add_score(self.amount);
            Ok(Step::Done)
        }
    }

    fn recording_world(segment_health: u32) -> StageWorld {
        StageWorld::new(
            ReplaySession::record_new(SessionMeta::anonymous()),
            Boss::new(BOSS_SPAWN, vec![segment_health]),
            ScoreBoard::new(None),
        )
    }

    fn idle_spell(max_time_frames: u32, grace_frames: u32, full_bonus: u64) -> SpellTask {
        SpellTask::new(SpellDef {
            name: "test.idle_spell",
            max_time_frames,
            grace_frames,
            full_bonus,
            attack: Box::new(|_world| Box::new(CoTask::new(IdleForever, ()))),
            cleanup: Box::new(|_world| Box::new(CoTask::new(FinishNow, ()))),
        })
    }

    fn advance(task: &mut SpellTask, world: &mut StageWorld) {
        task.advance(world).expect("advance");
    }

    #[test]
    fn depletion_after_grace_pays_linearly_decayed_bonus() {
        let mut world = recording_world(1_000);
        let mut spell = idle_spell(1_200, 300, 90_000);

        advance(&mut spell, &mut world); // setup
        for _ in 0..499 {
            advance(&mut spell, &mut world);
        }
        world.boss.damage(1_000);
        advance(&mut spell, &mut world); // watchdog observes depletion at 500
        advance(&mut spell, &mut world); // resolve

        // 90_000 * (1200 - 500) / (1200 - 300)
        assert_eq!(world.score.score(), 70_000);
        let stats = world.score.spell_stats("test.idle_spell").expect("stats");
        assert_eq!(stats.attempts, 1);
        assert_eq!(stats.successes, 1);
        assert_eq!(stats.best_score, 70_000);

        advance(&mut spell, &mut world); // cleanup finishes
        assert!(!spell.is_alive());
        assert!(matches!(
            spell.advance(&mut world),
            Err(TaskFault::AdvancedAfterDeath)
        ));
    }

    #[test]
    fn depletion_within_grace_pays_full_bonus() {
        let mut world = recording_world(1_000);
        let mut spell = idle_spell(1_200, 300, 90_000);

        advance(&mut spell, &mut world); // setup
        world.boss.damage(1_000);
        advance(&mut spell, &mut world); // depleted at frame 1
        advance(&mut spell, &mut world); // resolve

        assert_eq!(world.score.score(), 90_000);
    }

    #[test]
    fn player_hit_during_spell_zeroes_the_bonus() {
        let mut world = recording_world(1_000);
        let mut spell = idle_spell(1_200, 300, 90_000);

        advance(&mut spell, &mut world); // setup
        world.player.take_hit(&mut world.events);
        advance(&mut spell, &mut world); // observes the hit
        world.boss.damage(1_000);
        advance(&mut spell, &mut world);
        advance(&mut spell, &mut world); // resolve

        assert_eq!(world.score.score(), 0);
        let stats = world.score.spell_stats("test.idle_spell").expect("stats");
        assert_eq!(stats.attempts, 1);
        assert_eq!(stats.successes, 0);
        assert!(stats.practice_unlocked);
    }

    #[test]
    fn bomb_during_spell_zeroes_the_bonus() {
        let mut world = recording_world(1_000);
        let mut spell = idle_spell(1_200, 300, 90_000);

        advance(&mut spell, &mut world); // setup
        assert!(world.player.use_bomb(&mut world.events));
        advance(&mut spell, &mut world);
        world.boss.damage(1_000);
        advance(&mut spell, &mut world);
        advance(&mut spell, &mut world); // resolve

        assert_eq!(world.score.score(), 0);
    }

    #[test]
    fn timeout_pays_zero_and_counts_a_failed_attempt() {
        let mut world = recording_world(1_000);
        let mut spell = idle_spell(50, 10, 90_000);

        advance(&mut spell, &mut world); // setup
        for _ in 0..50 {
            advance(&mut spell, &mut world);
        }
        advance(&mut spell, &mut world); // resolve

        assert_eq!(world.score.score(), 0);
        let stats = world.score.spell_stats("test.idle_spell").expect("stats");
        assert_eq!(stats.attempts, 1);
        assert_eq!(stats.successes, 0);
    }

    #[test]
    fn spell_resolution_clears_live_bullets() {
        let mut world = recording_world(1_000);
        let mut spell = idle_spell(1_200, 300, 90_000);

        advance(&mut spell, &mut world); // setup
        world.spawn_bullet(Motion::aimed(BOSS_SPAWN, 2.0, 0.0));
        world.spawn_bullet(Motion::aimed(BOSS_SPAWN, 2.0, 1.0));
        world.boss.damage(1_000);
        advance(&mut spell, &mut world);
        assert_eq!(world.bullets.len(), 2);
        advance(&mut spell, &mut world); // resolve
        assert!(world.bullets.is_empty());
    }

    #[test]
    fn best_score_keeps_the_maximum_across_attempts() {
        let mut score = ScoreBoard::new(None);
        score.record_spell_attempt("x", true, 1_000);
        score.record_spell_attempt("x", true, 500);

        let stats = score.spell_stats("x").expect("stats");
        assert_eq!(stats.attempts, 2);
        assert_eq!(stats.successes, 2);
        assert_eq!(stats.best_score, 1_000);
    }

    #[test]
    fn attempt_stats_survive_a_reload_from_disk() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = stats_path(temp.path());

        let mut first = ScoreBoard::new(Some(path.clone()));
        first.record_spell_attempt("opening.ring_cascade", true, 70_000);
        drop(first);

        let second = ScoreBoard::new(Some(path));
        let stats = second
            .spell_stats("opening.ring_cascade")
            .expect("persisted stats");
        assert_eq!(stats.attempts, 1);
        assert_eq!(stats.successes, 1);
        assert_eq!(stats.best_score, 70_000);
        assert!(stats.practice_unlocked);
    }

    #[test]
    fn corrupt_stats_file_is_treated_as_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = stats_path(temp.path());
        fs::write(&path, "{ not stats").expect("write");

        let score = ScoreBoard::new(Some(path));
        assert!(score.spell_stats("anything").is_none());
    }

    #[test]
    fn stage_runs_encounters_in_order_then_pays_completion_bonus() {
        let mut world = recording_world(1_000);
        let mut stage = StageTask::new(
            vec![
                Box::new(|_world| Box::new(CoTask::new(AddScoreOnce { amount: 10 }, ()))),
                // Built lazily, so it sees the first encounter's effects.
                Box::new(|world: &mut StageWorld| {
                    let amount = world.score.score() + 5;
                    Box::new(CoTask::new(AddScoreOnce { amount }, ()))
                }),
            ],
            100,
            3,
        );

        let mut ticks = 0u32;
        while stage.is_alive() {
            stage.advance(&mut world).expect("advance");
            ticks += 1;
            assert!(ticks < 32, "stage failed to finish");
        }

        assert_eq!(world.score.score(), 10 + 15 + 100);
        assert!(matches!(
            stage.advance(&mut world),
            Err(TaskFault::AdvancedAfterDeath)
        ));
    }

    #[test]
    fn bomb_press_clears_bullets_and_emits_event() {
        let mut world = recording_world(1_000);
        world.spawn_bullet(Motion::aimed(BOSS_SPAWN, 2.0, 0.0));
        world
            .replay
            .set_held(engine::InputMask::empty().with(InputCode::Bomb));

        world.step_player();

        assert!(world.bullets.is_empty());
        assert_eq!(world.player.bombs, PLAYER_STARTING_BOMBS - 1);
        assert!(world
            .events
            .iter_emitted_so_far()
            .any(|event| *event == StageEvent::BombUsed));
        world.events.finish_tick();
        assert_eq!(world.events.iter_emitted_so_far().count(), 0);
    }

    #[test]
    fn bomb_during_a_live_tick_zeroes_the_bonus() {
        let mut sim = build_stage_sim(
            ReplaySession::record_new(SessionMeta::anonymous()),
            None,
        );
        sim.tick().expect("tick"); // opening spell announces itself

        sim.world
            .replay
            .set_held(engine::InputMask::empty().with(InputCode::Bomb));
        sim.tick().expect("tick");
        sim.world.replay.set_held(engine::InputMask::empty());
        assert_eq!(sim.world.player.bombs, PLAYER_STARTING_BOMBS - 1);

        sim.world.boss.damage(BOSS_SEGMENT_HEALTH);
        sim.tick().expect("tick"); // watchdog observes depletion
        sim.tick().expect("tick"); // resolution

        assert_eq!(sim.world.score.score(), 0);
        let stats = sim
            .world
            .score
            .spell_stats(OPENING_SPELL_NAME)
            .expect("stats");
        assert_eq!(stats.attempts, 1);
        assert_eq!(stats.successes, 0);
    }

    #[test]
    fn holding_shoot_through_live_ticks_captures_the_spell() {
        let mut sim = build_stage_sim(
            ReplaySession::record_new(SessionMeta::anonymous()),
            None,
        );
        sim.world
            .replay
            .set_held(engine::InputMask::empty().with(InputCode::Shoot));

        let mut ticks = 0u32;
        while sim.world.score.spell_stats(OPENING_SPELL_NAME).is_none() {
            sim.tick().expect("tick");
            ticks += 1;
            assert!(ticks < 400, "spell never resolved");
        }

        let stats = sim
            .world
            .score
            .spell_stats(OPENING_SPELL_NAME)
            .expect("stats");
        assert_eq!(stats.successes, 1);
        // Depletion lands well inside the grace window at this damage rate.
        assert_eq!(sim.world.score.score(), OPENING_SPELL_FULL_BONUS);
    }

    #[test]
    fn unknown_mode_is_a_loud_content_fault() {
        let session = ReplaySession::record_new(SessionMeta::anonymous());
        match build_sim_for_mode("boss_rush", session, None) {
            Err(TaskFault::ContentNotFound { name, expected }) => {
                assert_eq!(name, "boss_rush");
                assert_eq!(expected, "game mode");
            }
            other => panic!("expected a content fault, got {:?}", other.err()),
        }
    }

    #[test]
    fn demo_playback_reproduces_the_recorded_run_exactly() {
        let mut recording = build_stage_sim(
            ReplaySession::record_new(SessionMeta::anonymous()),
            None,
        );
        for _ in 0..240 {
            assert_eq!(recording.tick().expect("tick"), SimCommand::Continue);
        }
        let recorded_bullets: Vec<(f32, f32)> = recording
            .world
            .bullets
            .iter()
            .map(|bullet| {
                let position = bullet.borrow().position;
                (position.x, position.y)
            })
            .collect();
        let recorded_boss = recording.world.boss.motion.borrow().position;
        assert!(!recorded_bullets.is_empty());

        let record = recording.into_replay_record();
        assert_eq!(record.frame_count(), 240);

        let mut playback = build_stage_sim(ReplaySession::playback(record), None);
        for _ in 0..240 {
            assert_eq!(playback.tick().expect("tick"), SimCommand::Continue);
        }
        let replayed_bullets: Vec<(f32, f32)> = playback
            .world
            .bullets
            .iter()
            .map(|bullet| {
                let position = bullet.borrow().position;
                (position.x, position.y)
            })
            .collect();

        assert_eq!(replayed_bullets, recorded_bullets);
        let replayed_boss = playback.world.boss.motion.borrow().position;
        assert_eq!(replayed_boss, recorded_boss);
    }
