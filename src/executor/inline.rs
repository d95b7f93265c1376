//! Executor that runs tasks immediately on the enqueueing thread.

use super::{EnqueueError, Executor, Task};

/// An executor that invokes every task synchronously inside `enqueue`.
///
/// Useful as a default in tests and in embedders that want executor-shaped
/// plumbing without a scheduler. Enqueue never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl InlineExecutor {
    /// Creates an inline executor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Executor for InlineExecutor {
    fn enqueue(&self, task: Task) -> Result<(), EnqueueError> {
        task();
        Ok(())
    }
}
