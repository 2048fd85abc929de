mod bootstrap;
mod orchestration;

use std::process::ExitCode;

use engine::replay::save_to_path;
use engine::run_sim;
use tracing::{error, info};

pub(crate) fn run() -> ExitCode {
    let wiring = match bootstrap::build_app() {
        Ok(wiring) => wiring,
        Err(error) => {
            error!(error, "startup_failed");
            return ExitCode::FAILURE;
        }
    };
    let bootstrap::AppWiring {
        config,
        mut sim,
        replay_save_path,
    } = wiring;

    match run_sim(config, &mut sim) {
        Ok(stats) => info!(
            ticks_run = stats.ticks_run,
            backlog_clamps = stats.backlog_clamps,
            "run_complete"
        ),
        Err(error) => {
            error!(error = %error, "run_failed");
            return ExitCode::FAILURE;
        }
    }

    if let Some(path) = replay_save_path {
        let record = sim.into_replay_record();
        match save_to_path(&record, &path) {
            Ok(()) => info!(
                path = %path.display(),
                frames = record.frame_count(),
                "replay_saved"
            ),
            Err(error) => {
                error!(error = %error, path = %path.display(), "replay_save_failed");
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
