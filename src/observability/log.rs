//! Structured log events and the process-wide sink registry.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Severity of a log event.
///
/// The core emits few events and all of them are notable, so three levels
/// are enough: diagnostic detail, recovered trouble, and contract
/// violations. Filter by comparison: `event.level >= LogLevel::Warn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Diagnostic detail for development builds and tests.
    Debug,
    /// The core recovered on its own, but the embedder probably wants to
    /// know (a promise was broken, a hint went undelivered).
    Warn,
    /// A collaborator misbehaved and a fallback path ran.
    Error,
}

impl LogLevel {
    /// Short uppercase label for rendering.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single structured log event.
#[derive(Debug, Clone)]
pub struct LogEvent {
    /// Severity of the event.
    pub level: LogLevel,
    /// The module path that emitted the event.
    pub target: &'static str,
    /// Human-readable description.
    pub message: String,
    /// Structured key/value payload.
    pub fields: Vec<(&'static str, String)>,
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.level, self.target, self.message)?;
        for (key, value) in &self.fields {
            write!(f, " {key}={value}")?;
        }
        Ok(())
    }
}

/// Receiver for log events.
///
/// Implementations must tolerate concurrent calls from any thread,
/// including threads currently inside core dispatch.
pub trait LogSink: Send + Sync {
    /// Handles one event.
    fn log(&self, event: &LogEvent);
}

static SINK: RwLock<Option<Arc<dyn LogSink>>> = RwLock::new(None);

/// Installs the process-wide sink, replacing any previous one.
pub fn set_sink(sink: Arc<dyn LogSink>) {
    *SINK.write() = Some(sink);
}

/// Removes the process-wide sink.
pub fn clear_sink() {
    *SINK.write() = None;
}

/// Emits an event to the installed sink, if any.
pub(crate) fn emit(
    level: LogLevel,
    target: &'static str,
    message: impl Into<String>,
    fields: Vec<(&'static str, String)>,
) {
    let sink = SINK.read().clone();
    if let Some(sink) = sink {
        sink.log(&LogEvent {
            level,
            target,
            message: message.into(),
            fields,
        });
    }
}
