//! Manually drained FIFO executor.
//!
//! A thread-safe unbounded queue of tasks, drained explicitly by whoever
//! owns the run loop. Suits tests and single-threaded drivers that want
//! deterministic control over when continuations run.

use super::{EnqueueError, Executor, Task};
use crossbeam_queue::SegQueue;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// A queueing executor with explicit drain.
///
/// Tasks accumulate until [`run_one`](Self::run_one) or
/// [`run_all`](Self::run_all) is called. After [`close`](Self::close),
/// further enqueues fail; tasks still queued are dropped unrun when the
/// executor is dropped.
#[derive(Default)]
pub struct QueuedExecutor {
    inner: SegQueue<Task>,
    closed: AtomicBool,
}

impl QueuedExecutor {
    /// Creates an empty executor.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: SegQueue::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Runs the oldest queued task, if any. Returns whether one ran.
    pub fn run_one(&self) -> bool {
        self.inner.pop().is_some_and(|task| {
            task();
            true
        })
    }

    /// Runs queued tasks until the queue is empty. Returns how many ran.
    pub fn run_all(&self) -> usize {
        let mut ran = 0;
        while self.run_one() {
            ran += 1;
        }
        ran
    }

    /// Stops accepting new tasks. Already queued tasks may still be drained.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Returns the number of queued tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Executor for QueuedExecutor {
    fn enqueue(&self, task: Task) -> Result<(), EnqueueError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EnqueueError::Shutdown);
        }
        self.inner.push(task);
        Ok(())
    }
}

impl fmt::Debug for QueuedExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedExecutor")
            .field("len", &self.len())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
