mod input;
mod record;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use thiserror::Error;
use tracing::{debug, info};

pub use input::{InputCode, InputMask};
pub use record::{
    load_from_path, load_replay_list, save_to_path, Checkpoint, ReplayFileError, ReplayRecord,
    SessionMeta, REPLAY_VERSION,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayMode {
    Recording,
    Playback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// Playback ran past the last recorded frame; the session should end
    /// gracefully rather than aborting the process.
    ReplayExhausted,
}

#[derive(Debug, Error)]
pub enum ReplayFault {
    #[error("replay mask desync at frame {frame}: {masks} masks recorded")]
    MaskDesync { frame: u64, masks: usize },
    #[error("checkpoint '{name}' not found in replay record")]
    CheckpointMissing { name: String },
}

/// The single source of input state and randomness for every task in the
/// tree. While recording it captures one input mask per simulated frame and
/// a freshly seeded random source per checkpoint; during playback it serves
/// both back, which is what makes pattern generation reproducible.
pub struct ReplaySession {
    mode: ReplayMode,
    record: ReplayRecord,
    frame: u64,
    rng: Pcg32,
    held: InputMask,
}

impl ReplaySession {
    /// Starts a recording session. The random source is entropy-seeded
    /// here, but determinism is only guaranteed from the first checkpoint
    /// onward; orchestrators begin one before generating anything.
    pub fn record_new(meta: SessionMeta) -> Self {
        let seed = rand::random::<u64>();
        Self {
            mode: ReplayMode::Recording,
            record: ReplayRecord::new(meta),
            frame: 0,
            rng: Pcg32::seed_from_u64(seed),
            held: InputMask::empty(),
        }
    }

    /// Starts a playback session over a loaded record.
    pub fn playback(record: ReplayRecord) -> Self {
        Self {
            mode: ReplayMode::Playback,
            record,
            frame: 0,
            rng: Pcg32::seed_from_u64(0),
            held: InputMask::empty(),
        }
    }

    pub fn mode(&self) -> ReplayMode {
        self.mode
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn record(&self) -> &ReplayRecord {
        &self.record
    }

    pub fn into_record(self) -> ReplayRecord {
        self.record
    }

    /// Recording: capture the frame index, a fresh seed and an empty value
    /// map. Playback: look the checkpoint up by name and reseed the active
    /// random source, guaranteeing identical draws thereafter.
    pub fn begin_checkpoint(&mut self, name: &str) -> Result<(), ReplayFault> {
        match self.mode {
            ReplayMode::Recording => {
                let seed = rand::random::<u64>();
                self.rng = Pcg32::seed_from_u64(seed);
                self.record.checkpoints.push(Checkpoint {
                    name: name.to_string(),
                    frame: self.frame,
                    seed,
                    values: Default::default(),
                });
                info!(name, frame = self.frame, "checkpoint_recorded");
            }
            ReplayMode::Playback => {
                let checkpoint = self.record.checkpoint_by_name(name).ok_or_else(|| {
                    ReplayFault::CheckpointMissing {
                        name: name.to_string(),
                    }
                })?;
                self.rng = Pcg32::seed_from_u64(checkpoint.seed);
                debug!(name, frame = self.frame, "checkpoint_reseeded");
            }
        }
        Ok(())
    }

    /// The live input for the frame about to run. Only meaningful while
    /// recording; playback ignores it and reads the recorded masks.
    pub fn set_held(&mut self, mask: InputMask) {
        if self.mode == ReplayMode::Recording {
            self.held = mask;
        }
    }

    /// Advances the session by one simulated frame. Must be called exactly
    /// once per frame, after the frame's task-tree advance completes.
    pub fn tick(&mut self) -> Result<TickOutcome, ReplayFault> {
        match self.mode {
            ReplayMode::Recording => {
                self.record.masks.push(self.held);
                if self.record.masks.len() as u64 != self.frame + 1 {
                    return Err(ReplayFault::MaskDesync {
                        frame: self.frame,
                        masks: self.record.masks.len(),
                    });
                }
                self.frame += 1;
                Ok(TickOutcome::Continue)
            }
            ReplayMode::Playback => {
                if self.frame >= self.record.frame_count() {
                    return Ok(TickOutcome::ReplayExhausted);
                }
                self.frame += 1;
                Ok(TickOutcome::Continue)
            }
        }
    }

    pub fn is_pressed(&self, code: InputCode) -> bool {
        match self.mode {
            ReplayMode::Recording => self.held.is_held(code),
            ReplayMode::Playback => self.mask_at(self.frame).is_held(code),
        }
    }

    /// Held this frame but not the previous one.
    pub fn is_just_pressed(&self, code: InputCode) -> bool {
        if !self.is_pressed(code) {
            return false;
        }
        if self.frame == 0 {
            return true;
        }
        !self.mask_at(self.frame - 1).is_held(code)
    }

    /// Uniform draw from the active seeded source; identical in both modes
    /// given the same checkpoint seed.
    pub fn random_range(&mut self, min: f32, max: f32) -> f32 {
        if min >= max {
            return min;
        }
        self.rng.random_range(min..max)
    }

    /// Inclusive integer draw from the active seeded source.
    pub fn random_int(&mut self, min: i32, max: i32) -> i32 {
        if min >= max {
            return min;
        }
        self.rng.random_range(min..=max)
    }

    fn mask_at(&self, frame: u64) -> InputMask {
        self.record
            .masks
            .get(frame as usize)
            .copied()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> SessionMeta {
        SessionMeta::anonymous()
    }

    #[test]
    fn first_tick_yields_mask_length_one() {
        let mut session = ReplaySession::record_new(meta());
        session.tick().expect("tick");
        assert_eq!(session.record().frame_count(), 1);
    }

    #[test]
    fn sixty_ticks_yield_sixty_masks_without_fault() {
        let mut session = ReplaySession::record_new(meta());
        for _ in 0..60 {
            session.tick().expect("tick");
        }
        assert_eq!(session.record().frame_count(), 60);
        assert_eq!(session.frame(), 60);
    }

    #[test]
    fn tampered_mask_list_is_a_fatal_desync() {
        let mut session = ReplaySession::record_new(meta());
        session.tick().expect("tick");
        // Simulates an out-of-band writer corrupting the record.
        session.record.masks.push(InputMask::empty());
        assert!(matches!(
            session.tick(),
            Err(ReplayFault::MaskDesync { frame: 1, masks: 3 })
        ));
    }

    #[test]
    fn recording_reads_live_input_and_playback_reads_recorded() {
        let mut recording = ReplaySession::record_new(meta());
        recording.begin_checkpoint("start").expect("checkpoint");

        let frames = [
            InputMask::empty(),
            InputMask::empty().with(InputCode::Shoot),
            InputMask::empty().with(InputCode::Shoot),
            InputMask::empty().with(InputCode::Bomb),
        ];
        let mut recorded_pressed = Vec::new();
        let mut recorded_just = Vec::new();
        for mask in frames {
            recording.set_held(mask);
            recorded_pressed.push(recording.is_pressed(InputCode::Shoot));
            recorded_just.push(recording.is_just_pressed(InputCode::Shoot));
            recording.tick().expect("tick");
        }
        assert_eq!(recorded_pressed, vec![false, true, true, false]);
        assert_eq!(recorded_just, vec![false, true, false, false]);

        let mut playback = ReplaySession::playback(recording.into_record());
        playback.begin_checkpoint("start").expect("checkpoint");
        let mut replayed_pressed = Vec::new();
        let mut replayed_just = Vec::new();
        for _ in 0..4 {
            replayed_pressed.push(playback.is_pressed(InputCode::Shoot));
            replayed_just.push(playback.is_just_pressed(InputCode::Shoot));
            playback.tick().expect("tick");
        }
        assert_eq!(replayed_pressed, recorded_pressed);
        assert_eq!(replayed_just, recorded_just);
    }

    #[test]
    fn random_draws_replay_identically_between_checkpoints() {
        let mut recording = ReplaySession::record_new(meta());
        recording.begin_checkpoint("opener").expect("checkpoint");
        let first: Vec<f32> = (0..32).map(|_| recording.random_range(0.0, 360.0)).collect();
        recording.begin_checkpoint("midboss").expect("checkpoint");
        let second: Vec<i32> = (0..32).map(|_| recording.random_int(0, 100)).collect();

        let mut playback = ReplaySession::playback(recording.into_record());
        playback.begin_checkpoint("opener").expect("checkpoint");
        let first_replayed: Vec<f32> =
            (0..32).map(|_| playback.random_range(0.0, 360.0)).collect();
        playback.begin_checkpoint("midboss").expect("checkpoint");
        let second_replayed: Vec<i32> = (0..32).map(|_| playback.random_int(0, 100)).collect();

        assert_eq!(first, first_replayed);
        assert_eq!(second, second_replayed);
    }

    #[test]
    fn missing_checkpoint_is_a_loud_content_fault() {
        let mut playback = ReplaySession::playback(ReplayRecord::new(meta()));
        match playback.begin_checkpoint("no_such_spell") {
            Err(ReplayFault::CheckpointMissing { name }) => assert_eq!(name, "no_such_spell"),
            other => panic!("expected missing checkpoint, got {other:?}"),
        }
    }

    #[test]
    fn playback_reports_exhaustion_past_the_last_frame() {
        let mut recording = ReplaySession::record_new(meta());
        recording.tick().expect("tick");
        recording.tick().expect("tick");

        let mut playback = ReplaySession::playback(recording.into_record());
        assert_eq!(playback.tick().expect("tick"), TickOutcome::Continue);
        assert_eq!(playback.tick().expect("tick"), TickOutcome::Continue);
        assert_eq!(
            playback.tick().expect("tick"),
            TickOutcome::ReplayExhausted
        );
    }

    #[test]
    fn set_held_is_ignored_during_playback() {
        let mut recording = ReplaySession::record_new(meta());
        recording.tick().expect("tick");
        let mut playback = ReplaySession::playback(recording.into_record());
        playback.set_held(InputMask::empty().with(InputCode::Bomb));
        assert!(!playback.is_pressed(InputCode::Bomb));
    }
}
