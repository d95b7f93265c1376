//! Value-or-failure outcome type.
//!
//! An [`Outcome`] is the one thing a producer hands to a consumer: either the
//! value it promised or a [`Failure`] describing why there is none. There is
//! no empty outcome; a core's result slot is either absent or holds a
//! complete outcome.

use super::Failure;

/// The result of a producer: a value or a failure descriptor.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    /// The producer supplied the promised value.
    Success(T),
    /// The producer (or the dispatch machinery) supplied a failure.
    Failure(Failure),
}

impl<T> Outcome<T> {
    /// Creates a successful outcome.
    #[must_use]
    pub const fn success(value: T) -> Self {
        Self::Success(value)
    }

    /// Creates a failed outcome.
    #[must_use]
    pub const fn failure(failure: Failure) -> Self {
        Self::Failure(failure)
    }

    /// Returns true if this outcome carries a value.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns true if this outcome carries a failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Borrows the value, if present.
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    /// Borrows the failure, if present.
    #[must_use]
    pub const fn error(&self) -> Option<&Failure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }

    /// Maps the success value, passing failures through unchanged.
    #[must_use]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Success(value) => Outcome::Success(f(value)),
            Self::Failure(failure) => Outcome::Failure(failure),
        }
    }

    /// Converts into a standard `Result`.
    pub fn into_result(self) -> Result<T, Failure> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(failure) => Err(failure),
        }
    }
}

impl<T> From<Result<T, Failure>> for Outcome<T> {
    fn from(result: Result<T, Failure>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(failure) => Self::Failure(failure),
        }
    }
}

impl<T> From<Outcome<T>> for Result<T, Failure> {
    fn from(outcome: Outcome<T>) -> Self {
        outcome.into_result()
    }
}
