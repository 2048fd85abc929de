struct SpellDef {
    name: &'static str,
    max_time_frames: u32,
    grace_frames: u32,
    full_bonus: u64,
    attack: TaskBuilder<StageWorld>,
    cleanup: TaskBuilder<StageWorld>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpellPhase {
    Setup,
    Active,
    Resolving,
    Terminating,
    Done,
}

/// One boss spell from announcement to cleanup. The attack task runs under a
/// watchdog: depletion of the boss's health segment or the time limit,
/// whichever comes first, force-cancels it and moves to resolution.
struct SpellTask {
    name: &'static str,
    max_time_frames: u32,
    grace_frames: u32,
    full_bonus: u64,
    attack_builder: Option<TaskBuilder<StageWorld>>,
    cleanup_builder: Option<TaskBuilder<StageWorld>>,
    attack: Option<Box<dyn Task<StageWorld>>>,
    cleanup: Option<Box<dyn Task<StageWorld>>>,
    phase: SpellPhase,
    elapsed_frames: u32,
    failed_for_bonus: bool,
    timed_out: bool,
    resolve_frame: u32,
}

impl SpellTask {
    fn new(def: SpellDef) -> Self {
        Self {
            name: def.name,
            max_time_frames: def.max_time_frames,
            grace_frames: def.grace_frames,
            full_bonus: def.full_bonus,
            attack_builder: Some(def.attack),
            cleanup_builder: Some(def.cleanup),
            attack: None,
            cleanup: None,
            phase: SpellPhase::Setup,
            elapsed_frames: 0,
            failed_for_bonus: false,
            timed_out: false,
            resolve_frame: 0,
        }
    }

    /// Full inside the grace window, linear decay to zero at the time
    /// limit after it, zero outright for failed or timed-out attempts.
    fn bonus(&self) -> u64 {
        if self.timed_out || self.failed_for_bonus {
            return 0;
        }
        if self.resolve_frame <= self.grace_frames {
            return self.full_bonus;
        }
        let window = u64::from(self.max_time_frames - self.grace_frames);
        let left = u64::from(self.max_time_frames.saturating_sub(self.resolve_frame));
        self.full_bonus * left / window.max(1)
    }

    fn advance_setup(&mut self, world: &mut StageWorld) -> Result<(), TaskFault> {
        if world.boss.segment_depleted() {
            // A previous spell consumed the segment; arm the next one.
            world.boss.advance_segment();
        }
        world.replay.begin_checkpoint(self.name)?;
        self.elapsed_frames = 0;
        self.failed_for_bonus = false;
        self.timed_out = false;
        if let Some(builder) = self.attack_builder.take() {
            self.attack = Some(builder(world));
        }
        info!(
            spell = self.name,
            max_time_frames = self.max_time_frames,
            segment_health = world.boss.remaining_in_segment(),
            "spell_started"
        );
        self.phase = SpellPhase::Active;
        Ok(())
    }

    fn advance_active(&mut self, world: &mut StageWorld) -> Result<(), TaskFault> {
        for event in world.events.iter_emitted_so_far() {
            if matches!(event, StageEvent::PlayerHit | StageEvent::BombUsed)
                && !self.failed_for_bonus
            {
                self.failed_for_bonus = true;
                debug!(spell = self.name, event = ?event, "spell_bonus_failed");
            }
        }

        self.elapsed_frames = self.elapsed_frames.saturating_add(1);
        if let Some(attack) = &mut self.attack {
            if attack.is_alive() {
                attack.advance(world)?;
            }
        }

        let depleted = world.boss.segment_depleted();
        let timed_out = self.elapsed_frames >= self.max_time_frames;
        if depleted || timed_out {
            // Depletion on the limit frame still counts as a capture.
            self.timed_out = timed_out && !depleted;
            self.resolve_frame = self.elapsed_frames;
            if let Some(attack) = &mut self.attack {
                attack.cancel();
            }
            self.attack = None;
            self.phase = SpellPhase::Resolving;
        }
        Ok(())
    }

    fn advance_resolving(&mut self, world: &mut StageWorld) {
        world.clear_bullets();
        let success = !self.timed_out && !self.failed_for_bonus;
        let bonus = self.bonus();
        world.score.record_spell_attempt(self.name, success, bonus);
        world.score.add_score(bonus);
        info!(
            spell = self.name,
            success,
            bonus,
            resolve_frame = self.resolve_frame,
            timed_out = self.timed_out,
            "spell_resolved"
        );
        if let Some(builder) = self.cleanup_builder.take() {
            self.cleanup = Some(builder(world));
        }
        self.phase = SpellPhase::Terminating;
    }

    fn advance_terminating(&mut self, world: &mut StageWorld) -> Result<(), TaskFault> {
        let finished = match &mut self.cleanup {
            Some(cleanup) if cleanup.is_alive() => {
                cleanup.advance(world)?;
                !cleanup.is_alive()
            }
            _ => true,
        };
        if finished {
            self.cleanup = None;
            self.phase = SpellPhase::Done;
        }
        Ok(())
    }
}

impl Task<StageWorld> for SpellTask {
    fn advance(&mut self, world: &mut StageWorld) -> Result<(), TaskFault> {
        match self.phase {
            SpellPhase::Setup => self.advance_setup(world),
            SpellPhase::Active => self.advance_active(world),
            SpellPhase::Resolving => {
                self.advance_resolving(world);
                Ok(())
            }
            SpellPhase::Terminating => self.advance_terminating(world),
            SpellPhase::Done => Err(TaskFault::AdvancedAfterDeath),
        }
    }

    fn is_alive(&self) -> bool {
        self.phase != SpellPhase::Done
    }

    fn cancel(&mut self) -> bool {
        if self.phase == SpellPhase::Done {
            return false;
        }
        if let Some(attack) = &mut self.attack {
            attack.cancel();
        }
        if let Some(cleanup) = &mut self.cleanup {
            cleanup.cancel();
        }
        self.attack = None;
        self.cleanup = None;
        self.phase = SpellPhase::Done;
        true
    }
}
