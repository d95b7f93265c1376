//! The two owners of a rendezvous core.
//!
//! [`pair`] allocates one core and returns its two handles. The
//! [`ProducerHandle`] supplies the outcome and may register an interrupt
//! handler; the [`ConsumerHandle`] supplies the continuation, chooses the
//! executor, gates dispatch with the active flag, and may raise interrupts.
//! Dropping a handle detaches its side; the core is freed when both sides
//! and any in-flight executor task have let go.
//!
//! Handles are not clonable: each side has exactly one owner, which is what
//! makes the producer-side no-race contract between dropping and
//! [`set_result`](ProducerHandle::set_result) structural.

use crate::error::Result;
use crate::executor::{Executor, MID_PRIORITY};
use crate::rendezvous::{Core, CorePtr};
use crate::types::{Failure, Outcome};
use std::fmt;
use std::sync::Arc;

/// Creates a connected producer/consumer pair around a fresh core.
#[must_use]
pub fn pair<T: Send + 'static>() -> (ProducerHandle<T>, ConsumerHandle<T>) {
    let ptr = Core::allocate();
    (ProducerHandle { ptr }, ConsumerHandle { ptr })
}

/// The producing side of a rendezvous core.
///
/// Owned by whoever will eventually supply the outcome. May migrate between
/// threads; must not be accessed from two threads at once.
pub struct ProducerHandle<T: Send + 'static> {
    ptr: CorePtr<T>,
}

impl<T: Send + 'static> ProducerHandle<T> {
    /// Supplies the outcome. Callable at most once per core.
    ///
    /// If the consumer's callback is already installed and the core is
    /// active, the callback fires before this returns (inline or via the
    /// configured executor).
    pub fn set_result(&self, outcome: Outcome<T>) -> Result<()> {
        self.ptr.core().set_result(outcome)
    }

    /// Shorthand for a successful [`set_result`](Self::set_result).
    pub fn set_value(&self, value: T) -> Result<()> {
        self.set_result(Outcome::success(value))
    }

    /// Shorthand for a failed [`set_result`](Self::set_result).
    pub fn set_failure(&self, failure: Failure) -> Result<()> {
        self.set_result(Outcome::failure(failure))
    }

    /// Registers a receiver for an interrupt raised by the consumer.
    ///
    /// If an interrupt is already pending, the handler runs immediately on
    /// this thread (under the interrupt mutex — keep it short). If a result
    /// is already set, the handler is dropped unused.
    pub fn set_interrupt_handler<F>(&self, handler: F)
    where
        F: FnOnce(Failure) + Send + 'static,
    {
        self.ptr.core().set_interrupt_handler(Box::new(handler));
    }

    /// True once this core holds a result.
    #[must_use]
    pub fn is_fulfilled(&self) -> bool {
        self.ptr.core().has_result()
    }
}

impl<T: Send + 'static> Drop for ProducerHandle<T> {
    /// Detaches the producer side. If no result was ever set, the consumer
    /// receives a broken-promise failure carrying the result type's name.
    fn drop(&mut self) {
        Core::detach_producer(self.ptr);
    }
}

impl<T: Send + 'static> fmt::Debug for ProducerHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProducerHandle")
            .field("fulfilled", &self.is_fulfilled())
            .finish_non_exhaustive()
    }
}

/// The consuming side of a rendezvous core.
///
/// Owned by whoever will eventually consume the outcome. May migrate between
/// threads; must not be accessed from two threads at once.
pub struct ConsumerHandle<T: Send + 'static> {
    ptr: CorePtr<T>,
}

impl<T: Send + 'static> ConsumerHandle<T> {
    /// Creates a consumer over a core that already holds an outcome.
    ///
    /// There is no producer side; the first installed callback fires
    /// immediately (subject to the active flag and executor).
    #[must_use]
    pub fn from_outcome(outcome: Outcome<T>) -> Self {
        Self {
            ptr: Core::allocate_ready(outcome),
        }
    }

    /// Installs the continuation. Callable at most once per core.
    ///
    /// The current [`AmbientContext`](crate::AmbientContext) is snapshotted
    /// and restored around the callback's invocation, wherever it runs. If
    /// the result is already present and the core is active, the callback
    /// fires before this returns.
    pub fn install_callback<F>(&self, callback: F) -> Result<()>
    where
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        self.ptr.core().install_callback(callback)
    }

    /// Routes dispatch through `executor` at [`MID_PRIORITY`], or back
    /// inline with `None`.
    ///
    /// Call only while no dispatch is possible: before the callback is
    /// installed, or after it has already returned.
    pub fn set_executor(&self, executor: Option<Arc<dyn Executor>>) {
        self.set_executor_with_priority(executor, MID_PRIORITY);
    }

    /// Like [`set_executor`](Self::set_executor) with an explicit priority
    /// hint for executors that support several levels.
    pub fn set_executor_with_priority(&self, executor: Option<Arc<dyn Executor>>, priority: i8) {
        self.ptr.core().set_executor(executor, priority);
    }

    /// Returns the configured executor, if dispatch has not yet consumed it.
    #[must_use]
    pub fn executor(&self) -> Option<Arc<dyn Executor>> {
        self.ptr.core().executor()
    }

    /// Permits dispatch and fires any deferred Armed state.
    pub fn activate(&self) {
        self.ptr.core().activate();
    }

    /// Suppresses dispatch until [`activate`](Self::activate).
    pub fn deactivate(&self) {
        self.ptr.core().deactivate();
    }

    /// Reads the dispatch gate.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.ptr.core().is_active()
    }

    /// Raises an advisory interrupt toward the producer.
    ///
    /// Delivered to the producer's handler at most once; ignored after a
    /// result exists or a prior raise. Never fails the future by itself.
    pub fn raise(&self, failure: Failure) {
        self.ptr.core().raise(failure);
    }

    /// Fast check for a registered interrupt handler.
    #[must_use]
    pub fn has_interrupt_handler(&self) -> bool {
        self.ptr.core().has_interrupt_handler()
    }

    /// True once the producer's result is present.
    #[must_use]
    pub fn has_result(&self) -> bool {
        self.ptr.core().has_result()
    }

    /// Alias for [`has_result`](Self::has_result).
    #[must_use]
    pub fn ready(&self) -> bool {
        self.has_result()
    }

    /// Clones out the stored outcome.
    ///
    /// Fails with [`CoreError::NotReady`](crate::CoreError::NotReady) before
    /// the producer arrives, and with
    /// [`CoreError::AlreadyDelivered`](crate::CoreError::AlreadyDelivered)
    /// once dispatch has moved the outcome into the callback.
    pub fn try_result(&self) -> Result<Outcome<T>>
    where
        T: Clone,
    {
        self.ptr.core().try_result()
    }

    /// Borrows the stored outcome without cloning.
    ///
    /// `f` runs under the core's state mutex; keep it brief.
    pub fn with_result<R>(&self, f: impl FnOnce(&Outcome<T>) -> R) -> Result<R> {
        self.ptr.core().with_result(f)
    }
}

impl<T: Send + 'static> Drop for ConsumerHandle<T> {
    /// Detaches the consumer side, first forcing the core active so a
    /// deferred Armed state still resolves.
    fn drop(&mut self) {
        Core::detach_consumer(self.ptr);
    }
}

impl<T: Send + 'static> fmt::Debug for ConsumerHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerHandle")
            .field("ready", &self.has_result())
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
