use std::env;
use std::fs;
use std::path::PathBuf;

use thiserror::Error;

pub mod app;
pub mod math;
pub mod pattern;
pub mod replay;
pub mod task;

pub use app::{
    run_sim, run_sim_with_metrics, AppError, LoopConfig, LoopMetricsSnapshot, MetricsHandle,
    SimCommand, SimFault, SimStats, Simulation, SLOW_FRAME_ENV_VAR,
};
pub use math::Vec2;
pub use pattern::{
    Accelerate, AngularVelocity, CartesianAccel, EasingCurve, Motion, MotionRef, MoveTo,
};
pub use replay::{
    load_replay_list, Checkpoint, InputCode, InputMask, ReplayFault, ReplayFileError, ReplayMode,
    ReplayRecord, ReplaySession, SessionMeta, TickOutcome, REPLAY_VERSION,
};
pub use task::{
    BuilderSequence, CoTask, Parallel, Script, ScriptCx, Sequence, Step, Task, TaskBuilder,
    TaskFault, TaskId, Wait,
};

pub const DATA_DIR_ENV_VAR: &str = "BARRAGE_DATA_DIR";

#[derive(Debug, Clone)]
pub struct DataPaths {
    pub root: PathBuf,
    pub replays_dir: PathBuf,
    pub stats_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current working directory: {0}")]
    CurrentDir(#[source] std::io::Error),
    #[error("failed to create data directory at {path}: {source}")]
    CreateDataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Resolves where replays and run stats live on disk. BARRAGE_DATA_DIR wins
/// when set; otherwise everything goes under `data/` in the working
/// directory. Both subdirectories are created here so callers can write
/// without checking.
pub fn resolve_data_paths() -> Result<DataPaths, StartupError> {
    let root = match env::var(DATA_DIR_ENV_VAR) {
        Ok(value) => PathBuf::from(value),
        Err(env::VarError::NotPresent) => env::current_dir()
            .map_err(StartupError::CurrentDir)?
            .join("data"),
        Err(source) => {
            return Err(StartupError::EnvVar {
                var: DATA_DIR_ENV_VAR,
                source,
            })
        }
    };

    let replays_dir = root.join("replays");
    let stats_dir = root.join("stats");
    for dir in [&replays_dir, &stats_dir] {
        fs::create_dir_all(dir).map_err(|source| StartupError::CreateDataDir {
            path: dir.clone(),
            source,
        })?;
    }

    Ok(DataPaths {
        root,
        replays_dir,
        stats_dir,
    })
}
