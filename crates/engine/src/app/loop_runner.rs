use std::env;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use crate::replay::ReplayFault;
use crate::task::TaskFault;
use crate::StartupError;

use super::metrics::MetricsAccumulator;
use super::MetricsHandle;

pub const SLOW_FRAME_ENV_VAR: &str = "BARRAGE_SLOW_FRAME_MS";

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    pub simulated_slow_frame_ms: u64,
    /// When false the loop runs ticks back to back with no sleeping, which
    /// is what replay verification and tests want.
    pub paced: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            simulated_slow_frame_ms: 0,
            paced: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("simulation fault at tick {tick}: {source}")]
    Simulation {
        tick: u64,
        #[source]
        source: SimFault,
    },
}

#[derive(Debug, Error)]
pub enum SimFault {
    #[error(transparent)]
    Task(#[from] TaskFault),
    #[error(transparent)]
    Replay(#[from] ReplayFault),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimCommand {
    Continue,
    Exit,
}

/// One fixed-rate step of the hosted game. The loop owns pacing; the
/// simulation owns everything that happens inside a tick.
pub trait Simulation {
    fn tick(&mut self) -> Result<SimCommand, SimFault>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SimStats {
    pub ticks_run: u64,
    pub backlog_clamps: u64,
}

pub fn run_sim(config: LoopConfig, sim: &mut dyn Simulation) -> Result<SimStats, AppError> {
    let metrics_handle = MetricsHandle::default();
    run_sim_with_metrics(config, sim, metrics_handle)
}

pub fn run_sim_with_metrics(
    config: LoopConfig,
    sim: &mut dyn Simulation,
    metrics_handle: MetricsHandle,
) -> Result<SimStats, AppError> {
    let target_tps = config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
    let slow_frame_delay = resolve_slow_frame_delay(config.simulated_slow_frame_ms);

    info!(
        target_tps,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        slow_frame_delay_ms = slow_frame_delay.as_millis() as u64,
        paced = config.paced,
        "loop_config"
    );

    let mut stats = SimStats::default();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);

    if !config.paced {
        // Unpaced mode: every loop pass runs exactly one tick, as fast as
        // the host can go. Replay playback finishes in milliseconds.
        loop {
            let tick_start = Instant::now();
            let command = run_one_tick(sim, &mut stats)?;
            metrics_accumulator.record_tick(tick_start.elapsed());
            if let Some(snapshot) = metrics_accumulator.maybe_snapshot(Instant::now()) {
                metrics_handle.publish(snapshot);
                info!(
                    tps = snapshot.tps,
                    tick_time_ms = snapshot.tick_time_ms,
                    "loop_metrics"
                );
            }
            if command == SimCommand::Exit {
                break;
            }
        }
        info!(ticks_run = stats.ticks_run, "shutdown");
        return Ok(stats);
    }

    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();

    'frames: loop {
        if slow_frame_delay > Duration::ZERO {
            // Explicit debug perturbation only.
            thread::sleep(slow_frame_delay);
        }

        let now = Instant::now();
        let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
        last_frame_instant = now;

        let clamped_frame_dt = clamp_frame_delta(raw_frame_dt, max_frame_delta);
        accumulator = accumulator.saturating_add(clamped_frame_dt);

        let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
        for _ in 0..step_plan.ticks_to_run {
            let tick_start = Instant::now();
            let command = run_one_tick(sim, &mut stats)?;
            metrics_accumulator.record_tick(tick_start.elapsed());
            if command == SimCommand::Exit {
                break 'frames;
            }
        }
        accumulator = step_plan.remaining_accumulator;

        if step_plan.dropped_backlog > Duration::ZERO {
            stats.backlog_clamps = stats.backlog_clamps.saturating_add(1);
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame, "sim_clamp_triggered"
            );
        }

        if let Some(snapshot) = metrics_accumulator.maybe_snapshot(Instant::now()) {
            metrics_handle.publish(snapshot);
            info!(
                tps = snapshot.tps,
                tick_time_ms = snapshot.tick_time_ms,
                "loop_metrics"
            );
        }

        // Sleep off whatever budget is left before the next fixed step is due.
        let elapsed = Instant::now().saturating_duration_since(last_frame_instant);
        if accumulator.saturating_add(elapsed) < fixed_dt {
            thread::sleep(fixed_dt - accumulator.saturating_add(elapsed));
        }
    }

    info!(ticks_run = stats.ticks_run, "shutdown");
    Ok(stats)
}

fn run_one_tick(sim: &mut dyn Simulation, stats: &mut SimStats) -> Result<SimCommand, AppError> {
    let tick = stats.ticks_run;
    let command = sim
        .tick()
        .map_err(|source| AppError::Simulation { tick, source })?;
    stats.ticks_run = stats.ticks_run.saturating_add(1);
    Ok(command)
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        let dropped_backlog = accumulator;
        accumulator = Duration::ZERO;
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn resolve_slow_frame_delay(config_slow_frame_ms: u64) -> Duration {
    match env::var(SLOW_FRAME_ENV_VAR) {
        Ok(value) => match value.parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => {
                warn!(
                    env_var = SLOW_FRAME_ENV_VAR,
                    value = value.as_str(),
                    "invalid slow-frame env var value; falling back to config"
                );
                Duration::from_millis(config_slow_frame_ms)
            }
        },
        Err(env::VarError::NotPresent) => Duration::from_millis(config_slow_frame_ms),
        Err(err) => {
            warn!(
                env_var = SLOW_FRAME_ENV_VAR,
                error = %err,
                "unable to read slow-frame env var; falling back to config"
            );
            Duration::from_millis(config_slow_frame_ms)
        }
    }
}
