//! Tandem: the shared rendezvous core of a future/promise pair.
//!
//! # Overview
//!
//! A producer eventually supplies a result; a consumer eventually supplies a
//! continuation to run on that result. Tandem provides the single
//! heap-resident object that mediates between the two: whichever side arrives
//! last fires the continuation, exactly once, either inline on the arriving
//! thread or through an externally supplied executor. An advisory interrupt
//! channel flows the other way, from consumer toward producer.
//!
//! # Core Guarantees
//!
//! - **Exactly-once dispatch**: the continuation runs at most once, and runs
//!   whenever both a result and a callback exist and the core is active —
//!   even if the executor rejects the handoff.
//! - **Joint ownership without cycles**: the core is kept alive by an
//!   attachment count covering both sides plus any in-flight executor task;
//!   the last release frees it.
//! - **Context propagation**: the ambient context captured when the callback
//!   is installed is restored around its invocation, wherever it runs.
//! - **Advisory interrupts**: a raised interrupt is a hint to the producer,
//!   delivered to its handler at most once; it never fails the future by
//!   itself.
//!
//! # Module Structure
//!
//! - [`types`]: outcome and failure-descriptor types
//! - [`error`](mod@error): error types
//! - [`handle`]: the producer and consumer handles and their constructors
//! - [`executor`]: the executor contract plus inline and queued executors
//! - [`observability`]: structured logging and the ambient-context facility
//!
//! # Threading
//!
//! Each handle is owned by at most one thread at a time but may migrate
//! freely. The core synchronizes the two sides against each other; callers
//! synchronize access to their own handle.

// Default to deny for unsafe code - the rendezvous module opts back in for
// the attachment-counted heap lifetime it manages by hand.
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod executor;
pub mod handle;
pub mod observability;
pub mod types;

mod rendezvous;

// Re-exports for convenient access to core types
pub use error::{CoreError, Result};
pub use executor::{
    EnqueueError, Executor, InlineExecutor, QueuedExecutor, Task, HIGH_PRIORITY, LOW_PRIORITY,
    MID_PRIORITY, UNSPECIFIED_PRIORITY,
};
pub use handle::{pair, ConsumerHandle, ProducerHandle};
pub use observability::{AmbientContext, LogEvent, LogLevel, LogSink};
pub use types::{Failure, Outcome, PanicPayload};
