use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::input::InputMask;

pub const REPLAY_VERSION: u32 = 1;

/// Session metadata stamped into every recorded replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMeta {
    pub player_name: String,
    pub difficulty: String,
    pub character: String,
    pub mode: String,
    pub recorded_at_unix: u64,
}

impl SessionMeta {
    pub fn anonymous() -> Self {
        Self {
            player_name: "PLAYER".to_string(),
            difficulty: String::new(),
            character: String::new(),
            mode: String::new(),
            recorded_at_unix: 0,
        }
    }
}

/// A named (frame, seed, state-map) snapshot. The value map is reserved for
/// carrying extra simulation state across checkpoint boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub name: String,
    pub frame: u64,
    pub seed: u64,
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

/// Everything needed to replay a session bit-for-bit: one input mask per
/// simulated frame plus the checkpoints that reseed the random source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayRecord {
    pub replay_version: u32,
    pub meta: SessionMeta,
    pub masks: Vec<InputMask>,
    pub checkpoints: Vec<Checkpoint>,
}

impl ReplayRecord {
    pub fn new(meta: SessionMeta) -> Self {
        Self {
            replay_version: REPLAY_VERSION,
            meta,
            masks: Vec::new(),
            checkpoints: Vec::new(),
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.masks.len() as u64
    }

    pub fn checkpoint_by_name(&self, name: &str) -> Option<&Checkpoint> {
        self.checkpoints
            .iter()
            .find(|checkpoint| checkpoint.name == name)
    }
}

#[derive(Debug, Error)]
pub enum ReplayFileError {
    #[error("read replay '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("write replay '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("create replay dir '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("encode replay json: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("parse replay '{path}' at {field_path}: {source}")]
    Parse {
        path: PathBuf,
        field_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("replay '{path}': expected version {expected}, got {actual}")]
    VersionMismatch {
        path: PathBuf,
        expected: u32,
        actual: u32,
    },
}

pub fn save_to_path(record: &ReplayRecord, path: &Path) -> Result<(), ReplayFileError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ReplayFileError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let json = serde_json::to_string_pretty(record).map_err(ReplayFileError::Encode)?;
    fs::write(path, json).map_err(|source| ReplayFileError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_from_path(path: &Path) -> Result<ReplayRecord, ReplayFileError> {
    let raw = fs::read_to_string(path).map_err(|source| ReplayFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut deserializer = serde_json::Deserializer::from_str(&raw);
    let record: ReplayRecord = serde_path_to_error::deserialize(&mut deserializer).map_err(
        |error| {
            let field_path = error.path().to_string();
            ReplayFileError::Parse {
                path: path.to_path_buf(),
                field_path,
                source: error.into_inner(),
            }
        },
    )?;
    if record.replay_version != REPLAY_VERSION {
        return Err(ReplayFileError::VersionMismatch {
            path: path.to_path_buf(),
            expected: REPLAY_VERSION,
            actual: record.replay_version,
        });
    }
    Ok(record)
}

/// Loads every readable replay in a directory. Corrupt or mismatched files
/// are skipped with a warning; only failure to list the directory itself is
/// an error.
pub fn load_replay_list(dir: &Path) -> Result<Vec<(PathBuf, ReplayRecord)>, ReplayFileError> {
    let entries = fs::read_dir(dir).map_err(|source| ReplayFileError::Read {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut replays = Vec::new();
    for entry in entries {
        let Ok(entry) = entry else {
            continue;
        };
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }
        match load_from_path(&path) {
            Ok(record) => replays.push((path, record)),
            Err(error) => {
                warn!(path = %path.display(), error = %error, "replay_skipped");
            }
        }
    }
    replays.sort_by(|(a, _), (b, _)| a.cmp(b));
    Ok(replays)
}
