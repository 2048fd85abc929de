use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use engine::{
    Accelerate, AngularVelocity, BuilderSequence, CoTask, EasingCurve, InputCode, Motion,
    MotionRef, MoveTo, ReplayRecord, ReplaySession, Script, ScriptCx, SimCommand, SimFault,
    Simulation, Step, Task, TaskBuilder, TaskFault, TickOutcome, Vec2, Wait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const STATS_VERSION: u32 = 1;
const STATS_FILE_NAME: &str = "spell_stats.json";

const PLAYFIELD_HALF_WIDTH: f32 = 192.0;
const PLAYFIELD_HALF_HEIGHT: f32 = 224.0;
const BULLET_CULL_MARGIN: f32 = 32.0;

const PLAYER_SPAWN: Vec2 = Vec2 { x: 0.0, y: -160.0 };
const PLAYER_STARTING_LIVES: u32 = 3;
const PLAYER_STARTING_BOMBS: u32 = 3;
const PLAYER_SPEED_UNITS_PER_FRAME: f32 = 3.0;
const PLAYER_SLOW_MULTIPLIER: f32 = 0.5;
const PLAYER_SHOT_DAMAGE_PER_FRAME: u32 = 10;

const BOSS_SPAWN: Vec2 = Vec2 { x: 0.0, y: 96.0 };
const BOSS_SEGMENT_HEALTH: u32 = 1_500;

const STAGE_CLEAR_BONUS: u64 = 100_000;
const STAGE_POST_CLEAR_DELAY_FRAMES: u32 = 120;
const INTERLUDE_FRAMES: u32 = 180;
const RECENTER_FRAMES: u32 = 45;

const OPENING_SPELL_NAME: &str = "opening.ring_cascade";
const OPENING_SPELL_MAX_TIME_FRAMES: u32 = 1_800;
const OPENING_SPELL_GRACE_FRAMES: u32 = 300;
const OPENING_SPELL_FULL_BONUS: u64 = 300_000;
const RING_BULLET_COUNT: u32 = 24;
const RING_INTERVAL_FRAMES: u32 = 45;
const RING_BULLET_SPEED: f32 = 2.0;
const RING_BULLET_ACCEL: f32 = 0.015;
const RING_ACCEL_FRAMES: u32 = 90;

const FINALE_SPELL_NAME: &str = "finale.crossfire_sweep";
const FINALE_SPELL_MAX_TIME_FRAMES: u32 = 2_400;
const FINALE_SPELL_GRACE_FRAMES: u32 = 450;
const FINALE_SPELL_FULL_BONUS: u64 = 500_000;
const SWEEP_TRAVEL_FRAMES: u32 = 60;
const SWEEP_FAN_MIN_BULLETS: i32 = 5;
const SWEEP_FAN_MAX_BULLETS: i32 = 9;
const SWEEP_FAN_SPREAD_RADIANS: f32 = 0.9;
const SWEEP_BULLET_SPEED: f32 = 2.6;
const SWEEP_BULLET_CURL_RADIANS: f32 = 0.004;
const SWEEP_VOLLEY_INTERVAL_FRAMES: u32 = 20;

include!("types.rs");
include!("world.rs");
include!("spell.rs");
include!("stage.rs");

pub(crate) fn stats_path(stats_dir: &Path) -> PathBuf {
    stats_dir.join(STATS_FILE_NAME)
}
