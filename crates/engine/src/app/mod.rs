mod loop_runner;
mod metrics;

pub use loop_runner::{
    run_sim, run_sim_with_metrics, AppError, LoopConfig, SimCommand, SimFault, SimStats,
    Simulation, SLOW_FRAME_ENV_VAR,
};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
