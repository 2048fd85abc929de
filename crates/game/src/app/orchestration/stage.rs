#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StagePhase {
    Running,
    Clearing,
    Done,
}

/// The whole-stage orchestrator: a lazy sequence of encounters, then the
/// completion bonus and a fixed post-clear delay.
struct StageTask {
    encounters: BuilderSequence<StageWorld>,
    phase: StagePhase,
    completion_bonus: u64,
    clear_delay_remaining: u32,
}

impl StageTask {
    fn new(
        encounters: Vec<TaskBuilder<StageWorld>>,
        completion_bonus: u64,
        post_clear_delay_frames: u32,
    ) -> Self {
        Self {
            encounters: BuilderSequence::new(encounters),
            phase: StagePhase::Running,
            completion_bonus,
            clear_delay_remaining: post_clear_delay_frames,
        }
    }
}

impl Task<StageWorld> for StageTask {
    fn advance(&mut self, world: &mut StageWorld) -> Result<(), TaskFault> {
        match self.phase {
            StagePhase::Running => {
                if self.encounters.is_alive() {
                    self.encounters.advance(world)?;
                }
                if !self.encounters.is_alive() {
                    world.score.add_score(self.completion_bonus);
                    info!(
                        completion_bonus = self.completion_bonus,
                        score = world.score.score(),
                        "stage_clear"
                    );
                    self.phase = StagePhase::Clearing;
                }
                Ok(())
            }
            StagePhase::Clearing => {
                self.clear_delay_remaining = self.clear_delay_remaining.saturating_sub(1);
                if self.clear_delay_remaining == 0 {
                    self.phase = StagePhase::Done;
                }
                Ok(())
            }
            StagePhase::Done => Err(TaskFault::AdvancedAfterDeath),
        }
    }

    fn is_alive(&self) -> bool {
        self.phase != StagePhase::Done
    }

    fn cancel(&mut self) -> bool {
        if self.phase == StagePhase::Done {
            return false;
        }
        self.encounters.cancel();
        self.phase = StagePhase::Done;
        true
    }
}

/// Runs the stage task tree under the engine loop. One `tick` is one
/// simulated frame: player input first (so the events it emits are visible
/// to every task advanced this tick), then the root tree, bullet
/// integration, and the replay session's frame commit.
pub(crate) struct StageSim {
    world: StageWorld,
    root: Box<dyn Task<StageWorld>>,
}

impl StageSim {
    fn new(world: StageWorld, root: Box<dyn Task<StageWorld>>) -> Self {
        Self { world, root }
    }

    pub(crate) fn into_replay_record(self) -> ReplayRecord {
        self.world.replay.into_record()
    }
}

impl Simulation for StageSim {
    fn tick(&mut self) -> Result<SimCommand, SimFault> {
        self.world.step_player();
        if self.root.is_alive() {
            self.root.advance(&mut self.world)?;
        }
        self.world.integrate_bullets();
        self.world.events.finish_tick();

        if self.world.replay.tick()? == TickOutcome::ReplayExhausted {
            info!("replay_exhausted");
            return Ok(SimCommand::Exit);
        }
        if !self.root.is_alive() {
            return Ok(SimCommand::Exit);
        }
        Ok(SimCommand::Continue)
    }
}

/// Resolves the mode name a replay was recorded under. An unknown mode is a
/// content fault: the record references something this build cannot run.
pub(crate) fn build_sim_for_mode(
    mode: &str,
    replay: ReplaySession,
    stats_path: Option<PathBuf>,
) -> Result<StageSim, TaskFault> {
    match mode {
        "stage" => Ok(build_stage_sim(replay, stats_path)),
        other => Err(TaskFault::ContentNotFound {
            name: other.to_string(),
            expected: "game mode",
        }),
    }
}

fn build_stage_sim(replay: ReplaySession, stats_path: Option<PathBuf>) -> StageSim {
    let boss = Boss::new(BOSS_SPAWN, vec![BOSS_SEGMENT_HEALTH, BOSS_SEGMENT_HEALTH]);
    let score = ScoreBoard::new(stats_path);
    let world = StageWorld::new(replay, boss, score);
    StageSim::new(world, Box::new(demo_stage_task()))
}

fn demo_stage_task() -> StageTask {
    StageTask::new(
        vec![
            Box::new(|_world| Box::new(SpellTask::new(opening_spell_def()))),
            Box::new(|_world| Box::new(CoTask::new(InterludeScript { started: false }, ()))),
            Box::new(|_world| Box::new(SpellTask::new(finale_spell_def()))),
        ],
        STAGE_CLEAR_BONUS,
        STAGE_POST_CLEAR_DELAY_FRAMES,
    )
}

fn opening_spell_def() -> SpellDef {
    SpellDef {
        name: OPENING_SPELL_NAME,
        max_time_frames: OPENING_SPELL_MAX_TIME_FRAMES,
        grace_frames: OPENING_SPELL_GRACE_FRAMES,
        full_bonus: OPENING_SPELL_FULL_BONUS,
        attack: Box::new(|_world| Box::new(CoTask::new(RingCascadeScript, ()))),
        cleanup: Box::new(|_world| Box::new(CoTask::new(RecenterBossScript { started: false }, ()))),
    }
}

fn finale_spell_def() -> SpellDef {
    SpellDef {
        name: FINALE_SPELL_NAME,
        max_time_frames: FINALE_SPELL_MAX_TIME_FRAMES,
        grace_frames: FINALE_SPELL_GRACE_FRAMES,
        full_bonus: FINALE_SPELL_FULL_BONUS,
        attack: Box::new(|_world| Box::new(CoTask::new(CrossfireSweepScript { leg: 0 }, ()))),
        cleanup: Box::new(|_world| Box::new(CoTask::new(RecenterBossScript { started: false }, ()))),
    }
}

/// Rings of accelerating bullets from the boss, rotated by a seeded draw so
/// every ring differs but replays land identically. Runs until the spell
/// watchdog cancels it.
struct RingCascadeScript;

impl Script<StageWorld, ()> for RingCascadeScript {
    fn resume(
        &mut self,
        cx: &mut ScriptCx<'_, StageWorld, ()>,
    ) -> Result<Step<StageWorld>, TaskFault> {
        let world = cx.world();
        let base_angle = world.replay.random_range(0.0, std::f32::consts::TAU);
        let origin = world.boss.motion.borrow().position;
        let mut bullets = Vec::with_capacity(RING_BULLET_COUNT as usize);
        for index in 0..RING_BULLET_COUNT {
            let angle =
                base_angle + std::f32::consts::TAU * index as f32 / RING_BULLET_COUNT as f32;
            bullets.push(world.spawn_bullet(Motion::aimed(origin, RING_BULLET_SPEED, angle)));
        }
        for bullet in bullets {
            cx.attach(Box::new(Accelerate::for_frames(
                bullet,
                RING_BULLET_ACCEL,
                RING_ACCEL_FRAMES,
            )));
        }
        Ok(Step::Yield(Wait::Frames(RING_INTERVAL_FRAMES)))
    }
}

/// The boss sweeps between playfield corners, firing curling fans aimed at
/// the player on the way.
struct CrossfireSweepScript {
    leg: u32,
}

impl Script<StageWorld, ()> for CrossfireSweepScript {
    fn resume(
        &mut self,
        cx: &mut ScriptCx<'_, StageWorld, ()>,
    ) -> Result<Step<StageWorld>, TaskFault> {
        if self.leg % 2 == 0 {
            // Travel leg: glide toward an alternating corner.
            let side = if (self.leg / 2) % 2 == 0 { 1.0 } else { -1.0 };
            let corner = Vec2 {
                x: side * PLAYFIELD_HALF_WIDTH * 0.6,
                y: BOSS_SPAWN.y,
            };
            let motion = std::rc::Rc::clone(&cx.world().boss.motion);
            cx.attach(Box::new(MoveTo::new(
                motion,
                corner,
                SWEEP_TRAVEL_FRAMES,
                EasingCurve::EaseOut,
            )));
            self.leg += 1;
            return Ok(Step::Yield(Wait::Children));
        }

        // Volley leg: one aimed fan, then travel again.
        let world = cx.world();
        let fan_size = world
            .replay
            .random_int(SWEEP_FAN_MIN_BULLETS, SWEEP_FAN_MAX_BULLETS);
        let origin = world.boss.motion.borrow().position;
        let to_player = world.player.position - origin;
        let aim = to_player.y.atan2(to_player.x);
        let curl = world
            .replay
            .random_range(-SWEEP_BULLET_CURL_RADIANS, SWEEP_BULLET_CURL_RADIANS);
        let mut bullets = Vec::with_capacity(fan_size as usize);
        for index in 0..fan_size {
            let offset = if fan_size > 1 {
                SWEEP_FAN_SPREAD_RADIANS * (index as f32 / (fan_size - 1) as f32 - 0.5)
            } else {
                0.0
            };
            bullets.push(world.spawn_bullet(Motion::aimed(
                origin,
                SWEEP_BULLET_SPEED,
                aim + offset,
            )));
        }
        for bullet in bullets {
            cx.attach(Box::new(AngularVelocity::new(bullet, curl)));
        }
        self.leg += 1;
        Ok(Step::Yield(Wait::Frames(SWEEP_VOLLEY_INTERVAL_FRAMES)))
    }
}

/// Glides the boss back to its spawn point, then finishes.
struct RecenterBossScript {
    started: bool,
}

impl Script<StageWorld, ()> for RecenterBossScript {
    fn resume(
        &mut self,
        cx: &mut ScriptCx<'_, StageWorld, ()>,
    ) -> Result<Step<StageWorld>, TaskFault> {
        if !self.started {
            self.started = true;
            let motion = std::rc::Rc::clone(&cx.world().boss.motion);
            cx.attach(Box::new(MoveTo::new(
                motion,
                BOSS_SPAWN,
                RECENTER_FRAMES,
                EasingCurve::SmoothStep,
            )));
            return Ok(Step::Yield(Wait::Children));
        }
        Ok(Step::Done)
    }
}

/// Quiet gap between spells.
struct InterludeScript {
    started: bool,
}

impl Script<StageWorld, ()> for InterludeScript {
    fn resume(
        &mut self,
        cx: &mut ScriptCx<'_, StageWorld, ()>,
    ) -> Result<Step<StageWorld>, TaskFault> {
        if !self.started {
            self.started = true;
            debug!(frame = cx.frame(), "stage_interlude");
            return Ok(Step::Yield(Wait::Frames(INTERLUDE_FRAMES)));
        }
        Ok(Step::Done)
    }
}
