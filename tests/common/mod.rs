//! Common fixtures for the integration suites.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use tandem::observability::{set_sink, LogEvent, LogSink};
use tandem::{EnqueueError, Executor, Task};

static INIT: Once = Once::new();

struct StderrSink;

impl LogSink for StderrSink {
    fn log(&self, event: &LogEvent) {
        eprintln!("{event}");
    }
}

/// Routes crate logging to stderr, once per test binary.
pub fn init_test_logging() {
    INIT.call_once(|| set_sink(Arc::new(StderrSink)));
}

/// A payload whose drops are counted, for exactly-once destruction checks.
#[derive(Debug)]
pub struct Canary {
    drops: Arc<AtomicUsize>,
}

impl Canary {
    pub fn new(drops: &Arc<AtomicUsize>) -> Self {
        Self {
            drops: drops.clone(),
        }
    }
}

impl Drop for Canary {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// An executor that rejects every task.
pub struct RejectingExecutor;

impl Executor for RejectingExecutor {
    fn enqueue(&self, _task: Task) -> Result<(), EnqueueError> {
        Err(EnqueueError::QueueFull)
    }
}
