use std::env;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use engine::replay::load_from_path;
use engine::{resolve_data_paths, LoopConfig, ReplaySession, SessionMeta};
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::orchestration;

const REPLAY_ENV_VAR: &str = "BARRAGE_REPLAY";
const PLAYER_NAME_ENV_VAR: &str = "BARRAGE_PLAYER";
const UNPACED_ENV_VAR: &str = "BARRAGE_UNPACED";

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) sim: orchestration::StageSim,
    /// Set for recording runs; the record is written here on clean exit.
    pub(crate) replay_save_path: Option<PathBuf>,
}

pub(crate) fn build_app() -> Result<AppWiring, String> {
    init_tracing();
    info!("=== Barrage Startup ===");

    let data_paths = resolve_data_paths().map_err(|error| error.to_string())?;
    info!(
        root = %data_paths.root.display(),
        replays_dir = %data_paths.replays_dir.display(),
        stats_dir = %data_paths.stats_dir.display(),
        "data_paths"
    );

    let (session, mode, replay_save_path, playback) = match env::var(REPLAY_ENV_VAR) {
        Ok(path) => {
            let record = load_from_path(Path::new(&path)).map_err(|error| error.to_string())?;
            info!(
                path = path.as_str(),
                frames = record.frame_count(),
                player = record.meta.player_name.as_str(),
                mode = record.meta.mode.as_str(),
                "replay_loaded"
            );
            let mode = record.meta.mode.clone();
            (ReplaySession::playback(record), mode, None, true)
        }
        Err(_) => {
            let meta = session_meta_from_env();
            let mode = meta.mode.clone();
            let save_path = data_paths
                .replays_dir
                .join(format!("run-{}.json", meta.recorded_at_unix));
            (ReplaySession::record_new(meta), mode, Some(save_path), false)
        }
    };

    let stats_path = orchestration::stats_path(&data_paths.stats_dir);
    let sim = orchestration::build_sim_for_mode(&mode, session, Some(stats_path))
        .map_err(|error| error.to_string())?;

    // Playback runs unpaced so verification finishes immediately; a live
    // recording run keeps the fixed 60 tps pacing.
    let unpaced = playback || env::var(UNPACED_ENV_VAR).is_ok_and(|value| value == "1");
    let config = LoopConfig {
        paced: !unpaced,
        ..LoopConfig::default()
    };

    Ok(AppWiring {
        config,
        sim,
        replay_save_path,
    })
}

fn session_meta_from_env() -> SessionMeta {
    let mut meta = SessionMeta::anonymous();
    if let Ok(name) = env::var(PLAYER_NAME_ENV_VAR) {
        if !name.trim().is_empty() {
            meta.player_name = name.trim().to_string();
        }
    }
    meta.difficulty = "normal".to_string();
    meta.character = "demo".to_string();
    meta.mode = "stage".to_string();
    meta.recorded_at_unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);
    meta
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
