mod composite;
mod cooperative;

use thiserror::Error;

use crate::replay::ReplayFault;

pub use composite::{BuilderSequence, Parallel, Sequence, TaskBuilder};
pub use cooperative::{CoTask, Script, ScriptCx, Step, Wait};

/// Identifies one attached child within its owning parent. Ids are scoped to
/// the parent that allocated them and are never reused within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub(crate) u64);

#[derive(Debug, Error)]
pub enum TaskFault {
    #[error("dead task advanced; the task tree is no longer consistent")]
    AdvancedAfterDeath,
    #[error("content lookup failed: no {expected} named '{name}'")]
    ContentNotFound { name: String, expected: &'static str },
    #[error("script fault: {0}")]
    Script(String),
    #[error(transparent)]
    Replay(#[from] ReplayFault),
}

/// The smallest unit of schedulable per-frame work.
///
/// Contract: `advance` runs exactly one frame of logic. Once `is_alive`
/// reports false it stays false, and advancing the task again is a fatal
/// tree-consistency fault, not a silent no-op.
pub trait Task<W> {
    fn advance(&mut self, world: &mut W) -> Result<(), TaskFault>;

    fn is_alive(&self) -> bool;

    /// Force-terminates this task and, recursively, every descendant before
    /// returning. Returns false when the task was already dead.
    fn cancel(&mut self) -> bool;
}
