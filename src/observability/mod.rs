//! Structured logging and diagnostic context.
//!
//! The crate logs sparingly — only the events that indicate something went
//! sideways (a broken promise being synthesized, an executor rejecting a
//! dispatch). Events flow to a process-wide [`LogSink`] that embedders
//! install; with no sink installed, logging is a cheap no-op.
//!
//! - [`log`](mod@log): severity, event records, the sink trait, and the
//!   sink registry
//! - [`context`]: the ambient-context snapshot/restore facility

pub mod context;
pub mod log;

pub use context::{AmbientContext, ContextGuard};
pub use log::{clear_sink, set_sink, LogEvent, LogLevel, LogSink};
