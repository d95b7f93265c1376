//! Error types.

use thiserror::Error;

/// Errors reported by core operations.
///
/// The first two variants are protocol misuse: the offending call is rejected
/// synchronously and the state already established by the first call is
/// retained unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CoreError {
    /// `set_result` was called on a core that already holds a result.
    #[error("result already set")]
    ResultAlreadySet,

    /// `install_callback` was called on a core that already has a callback.
    #[error("callback already installed")]
    CallbackAlreadyInstalled,

    /// The result was queried before the producer supplied one.
    #[error("result is not ready")]
    NotReady,

    /// The result was queried after dispatch had already moved it into the
    /// callback.
    #[error("result already delivered to the callback")]
    AlreadyDelivered,

    /// The producer was dropped without ever setting a result. Carries the
    /// name of the result type.
    #[error("broken promise for `{0}`")]
    BrokenPromise(&'static str),
}

/// A specialized result type for core operations.
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
