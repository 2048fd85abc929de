#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StageEvent {
    PlayerHit,
    PlayerDied,
    BombUsed,
}

/// Events emitted during the current tick, visible to every task advanced
/// later the same tick. The sim empties the bus at the end of each tick, so
/// emitters must run before the tasks that consume their events.
#[derive(Default)]
struct StageEventBus {
    current_tick_events: Vec<StageEvent>,
}

impl StageEventBus {
    fn emit(&mut self, event: StageEvent) {
        self.current_tick_events.push(event);
    }

    fn iter_emitted_so_far(&self) -> impl Iterator<Item = &StageEvent> {
        self.current_tick_events.iter()
    }

    fn finish_tick(&mut self) {
        self.current_tick_events.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PlayerState {
    position: Vec2,
    lives: u32,
    bombs: u32,
}

impl PlayerState {
    fn new() -> Self {
        Self {
            position: PLAYER_SPAWN,
            lives: PLAYER_STARTING_LIVES,
            bombs: PLAYER_STARTING_BOMBS,
        }
    }

    fn take_hit(&mut self, events: &mut StageEventBus) {
        events.emit(StageEvent::PlayerHit);
        self.lives = self.lives.saturating_sub(1);
        if self.lives == 0 {
            events.emit(StageEvent::PlayerDied);
        }
    }

    fn use_bomb(&mut self, events: &mut StageEventBus) -> bool {
        if self.bombs == 0 {
            return false;
        }
        self.bombs -= 1;
        events.emit(StageEvent::BombUsed);
        true
    }
}

/// Boss health is segmented: each spell drains one segment, and depleting
/// the active segment is what ends the spell early.
struct Boss {
    motion: MotionRef,
    segments: Vec<u32>,
    active_segment: usize,
}

impl Boss {
    fn new(position: Vec2, segments: Vec<u32>) -> Self {
        Self {
            motion: std::rc::Rc::new(std::cell::RefCell::new(Motion::at(position))),
            segments,
            active_segment: 0,
        }
    }

    fn damage(&mut self, amount: u32) {
        if let Some(health) = self.segments.get_mut(self.active_segment) {
            *health = health.saturating_sub(amount);
        }
    }

    fn segment_depleted(&self) -> bool {
        self.segments
            .get(self.active_segment)
            .is_none_or(|health| *health == 0)
    }

    fn remaining_in_segment(&self) -> u32 {
        self.segments.get(self.active_segment).copied().unwrap_or(0)
    }

    /// Moves to the next health segment. Returns false when none remain.
    fn advance_segment(&mut self) -> bool {
        if self.active_segment + 1 < self.segments.len() {
            self.active_segment += 1;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct SpellAttemptStats {
    attempts: u32,
    successes: u32,
    best_score: u64,
    practice_unlocked: bool,
}

impl SpellAttemptStats {
    fn record_attempt(&mut self, success: bool, bonus: u64) {
        self.attempts = self.attempts.saturating_add(1);
        if success {
            self.successes = self.successes.saturating_add(1);
        }
        self.best_score = self.best_score.max(bonus);
        self.practice_unlocked = true;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StatsFile {
    stats_version: u32,
    spells: BTreeMap<String, SpellAttemptStats>,
}

struct ScoreBoard {
    score: u64,
    spells: BTreeMap<String, SpellAttemptStats>,
    stats_path: Option<PathBuf>,
}

impl ScoreBoard {
    /// Loads previously persisted attempt statistics when the file exists.
    /// A corrupt or mismatched file is logged and treated as empty rather
    /// than aborting the run.
    fn new(stats_path: Option<PathBuf>) -> Self {
        let spells = stats_path
            .as_deref()
            .map(load_stats_file)
            .unwrap_or_default();
        Self {
            score: 0,
            spells,
            stats_path,
        }
    }

    fn score(&self) -> u64 {
        self.score
    }

    fn add_score(&mut self, amount: u64) {
        self.score = self.score.saturating_add(amount);
    }

    fn spell_stats(&self, name: &str) -> Option<&SpellAttemptStats> {
        self.spells.get(name)
    }

    fn record_spell_attempt(&mut self, name: &str, success: bool, bonus: u64) {
        self.spells
            .entry(name.to_string())
            .or_default()
            .record_attempt(success, bonus);
        self.persist();
    }

    fn persist(&self) {
        let Some(path) = self.stats_path.as_deref() else {
            return;
        };
        let file = StatsFile {
            stats_version: STATS_VERSION,
            spells: self.spells.clone(),
        };
        let serialized = match serde_json::to_string_pretty(&file) {
            Ok(serialized) => serialized,
            Err(error) => {
                warn!(error = %error, "stats_encode_failed");
                return;
            }
        };
        if let Err(error) = fs::write(path, serialized) {
            warn!(error = %error, path = %path.display(), "stats_write_failed");
        }
    }
}

fn load_stats_file(path: &Path) -> BTreeMap<String, SpellAttemptStats> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => return BTreeMap::new(),
    };
    let deserializer = &mut serde_json::Deserializer::from_str(&raw);
    let file: StatsFile = match serde_path_to_error::deserialize(deserializer) {
        Ok(file) => file,
        Err(error) => {
            warn!(
                path = %path.display(),
                field_path = %error.path(),
                error = %error,
                "stats_parse_failed"
            );
            return BTreeMap::new();
        }
    };
    if file.stats_version != STATS_VERSION {
        warn!(
            path = %path.display(),
            found = file.stats_version,
            expected = STATS_VERSION,
            "stats_version_mismatch"
        );
        return BTreeMap::new();
    }
    file.spells
}
