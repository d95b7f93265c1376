//! Opaque failure descriptor.
//!
//! A [`Failure`] wraps any error value so it can travel through the outcome
//! channel, be inspected by type, and be cloned cheaply into every place that
//! needs it (the interrupt slot, an interrupt handler, a cloned outcome).

use crate::error::CoreError;
use std::any::Any;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// An opaque, cheaply clonable failure descriptor.
///
/// Constructed from a typed error value, from a captured panic payload, or
/// from the well-known broken-promise signal. The original error remains
/// inspectable through [`Failure::downcast_ref`].
#[derive(Clone)]
pub struct Failure {
    inner: Arc<dyn Error + Send + Sync + 'static>,
}

impl Failure {
    /// Wraps a typed error value.
    pub fn new<E>(error: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(error),
        }
    }

    /// Wraps a panic payload captured by `catch_unwind`.
    ///
    /// String payloads (the common case for `panic!` with a message) are
    /// preserved verbatim; anything else is recorded as opaque.
    #[must_use]
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&'static str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "opaque panic payload".to_string()
        };
        Self::new(PanicPayload { message })
    }

    /// The failure delivered when a producer is dropped without setting a
    /// result. Carries the name of the result type.
    #[must_use]
    pub fn broken_promise(type_name: &'static str) -> Self {
        Self::new(CoreError::BrokenPromise(type_name))
    }

    /// Returns true if this failure is the broken-promise signal.
    #[must_use]
    pub fn is_broken_promise(&self) -> bool {
        matches!(
            self.downcast_ref::<CoreError>(),
            Some(CoreError::BrokenPromise(_))
        )
    }

    /// Attempts to view the wrapped error as a concrete type.
    #[must_use]
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }

    /// Returns true if the wrapped error is of type `E`.
    #[must_use]
    pub fn is<E: Error + 'static>(&self) -> bool {
        self.downcast_ref::<E>().is_some()
    }

    /// Borrows the wrapped error.
    #[must_use]
    pub fn as_error(&self) -> &(dyn Error + 'static) {
        &*self.inner
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Failure").field(&self.inner).finish()
    }
}

impl Error for Failure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.as_error())
    }
}

impl From<CoreError> for Failure {
    fn from(error: CoreError) -> Self {
        Self::new(error)
    }
}

/// A panic payload recorded as a failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("panic: {message}")]
pub struct PanicPayload {
    /// The panic message, or a placeholder for non-string payloads.
    pub message: String,
}
