//! The shared rendezvous core.
//!
//! A [`Core`] is the single heap object jointly owned by a producer handle,
//! a consumer handle, and any task it has in flight on an executor. It
//! composes three independent events — result arrival, callback arrival, and
//! activation — into one deterministic fire of the continuation.
//!
//! # Locking
//!
//! Two one-byte spin mutexes: one guards the state machine together with the
//! slots it publishes (result, callback, context, executor), the other guards
//! the interrupt channel. Critical sections are O(1) and contention is
//! bounded by the two-owner structure. User code never runs under the state
//! mutex; the interrupt handler runs under the interrupt mutex by contract.
//! Lock order is interrupt mutex, then state mutex; the state path never
//! takes the interrupt mutex.
//!
//! # Lifetime
//!
//! The core is freed when its attachment count reaches zero: one attachment
//! per live handle, plus transient attachments covering dispatch and any
//! enqueued task. The callback object has its own reference count so an
//! executor that drops a task unrun still releases the callback exactly once.

// The attachment-counted heap lifetime is managed by hand; this module alone
// opts back into unsafe code for the raw pointer it shares between owners.
#![allow(unsafe_code)]

pub(crate) mod state;

use crate::error::CoreError;
use crate::executor::{Executor, Task, UNSPECIFIED_PRIORITY};
use crate::observability::log::emit;
use crate::observability::{AmbientContext, LogLevel};
use crate::types::{Failure, Outcome};
use spin::mutex::SpinMutex;
use state::State;
use std::mem;
use std::ptr::NonNull;
use std::sync::atomic::{fence, AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

const LOG_TARGET: &str = "tandem::rendezvous";

/// The continuation installed by the consumer side.
pub(crate) type Callback<T> = Box<dyn FnOnce(Outcome<T>) + Send + 'static>;

/// The producer's receiver for a raised interrupt.
pub(crate) type InterruptHandler = Box<dyn FnOnce(Failure) + Send + 'static>;

/// Hot dispatch fields, published together under the state mutex.
///
/// The callback and result slots sit adjacent so a fire touches one region.
struct Hot<T> {
    state: State,
    callback: Option<Callback<T>>,
    result: Option<Outcome<T>>,
    context: AmbientContext,
    executor: Option<Arc<dyn Executor>>,
    priority: i8,
}

/// Interrupt slot and handler, guarded by their own mutex.
struct InterruptState {
    interrupt: Option<Failure>,
    handler: Option<InterruptHandler>,
}

/// The shared state object behind a producer/consumer handle pair.
///
/// Some operations must only be called from the side that owns them; see the
/// per-method docs. Either handle may migrate between threads, but each is
/// owned by at most one thread at a time. The core synchronizes the two
/// sides against each other.
pub(crate) struct Core<T: Send + 'static> {
    hot: SpinMutex<Hot<T>>,
    interrupt: SpinMutex<InterruptState>,
    attached: AtomicU8,
    callback_refs: AtomicU8,
    active: AtomicBool,
    handler_present: AtomicBool,
}

// The slots are reached only through the spin mutexes or the atomic fields,
// so sharing requires no more than the payload being sendable.
unsafe impl<T: Send + 'static> Send for Core<T> {}
unsafe impl<T: Send + 'static> Sync for Core<T> {}

impl<T: Send + 'static> Core<T> {
    /// Heap-allocates a core in `Start` with one attachment per side.
    pub(crate) fn allocate() -> CorePtr<T> {
        Self::allocate_raw(State::Start, None, 2)
    }

    /// Heap-allocates a core already holding an outcome, owned by the
    /// consumer side alone.
    pub(crate) fn allocate_ready(outcome: Outcome<T>) -> CorePtr<T> {
        Self::allocate_raw(State::OnlyResult, Some(outcome), 1)
    }

    fn allocate_raw(state: State, result: Option<Outcome<T>>, attached: u8) -> CorePtr<T> {
        let core = Box::new(Self {
            hot: SpinMutex::new(Hot {
                state,
                callback: None,
                result,
                context: AmbientContext::new(),
                executor: None,
                priority: UNSPECIFIED_PRIORITY,
            }),
            interrupt: SpinMutex::new(InterruptState {
                interrupt: None,
                handler: None,
            }),
            attached: AtomicU8::new(attached),
            callback_refs: AtomicU8::new(0),
            active: AtomicBool::new(true),
            handler_present: AtomicBool::new(false),
        });
        CorePtr {
            ptr: NonNull::from(Box::leak(core)),
        }
    }

    // ── Producer side ───────────────────────────────────────────────────

    /// Stores the outcome. Call only from the producer side, at most once.
    ///
    /// Arming the core (callback already present) attempts dispatch before
    /// returning.
    pub(crate) fn set_result(&self, outcome: Outcome<T>) -> Result<(), CoreError> {
        let armed = {
            let mut hot = self.hot.lock();
            match hot.state {
                State::Start => {
                    hot.result = Some(outcome);
                    hot.state = State::OnlyResult;
                    false
                }
                State::OnlyCallback => {
                    hot.result = Some(outcome);
                    hot.state = State::Armed;
                    true
                }
                State::OnlyResult | State::Armed | State::Done => {
                    return Err(CoreError::ResultAlreadySet);
                }
            }
        };
        if armed {
            self.maybe_fire();
        }
        Ok(())
    }

    /// Registers a receiver for a raised interrupt. Call only from the
    /// producer side.
    ///
    /// A handler registered after the result is set is dropped unused. A
    /// handler registered after an interrupt was raised is invoked
    /// immediately, on this thread, under the interrupt mutex — keep
    /// handlers short and non-reentrant.
    pub(crate) fn set_interrupt_handler(&self, handler: InterruptHandler) {
        let mut interrupt = self.interrupt.lock();
        if self.has_result() {
            return;
        }
        match interrupt.interrupt.clone() {
            Some(pending) => handler(pending),
            None => {
                interrupt.handler = Some(handler);
                self.handler_present.store(true, Ordering::Relaxed);
            }
        }
    }

    /// Producer-side detach. Synthesizes a broken-promise outcome if none
    /// was ever set, then releases one attachment.
    pub(crate) fn detach_producer(ptr: CorePtr<T>) {
        let core = ptr.core();
        if !core.has_result() {
            let type_name = std::any::type_name::<T>();
            emit(
                LogLevel::Warn,
                LOG_TARGET,
                "producer detached without a result; synthesizing broken promise",
                vec![("type", type_name.to_string())],
            );
            // Cannot fail: producer-side calls never race each other and the
            // result slot was just observed empty.
            let _ = core.set_result(Outcome::failure(Failure::broken_promise(type_name)));
        }
        ptr.detach_one();
    }

    // ── Consumer side ───────────────────────────────────────────────────

    /// Installs the continuation. Call only from the consumer side, at most
    /// once. Snapshots the current ambient context for restoration around
    /// the invocation.
    ///
    /// Arming the core (result already present) attempts dispatch before
    /// returning.
    pub(crate) fn install_callback<F>(&self, callback: F) -> Result<(), CoreError>
    where
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        let context = AmbientContext::current();
        let armed = {
            let mut hot = self.hot.lock();
            match hot.state {
                State::Start => {
                    hot.context = context;
                    hot.callback = Some(Box::new(callback));
                    hot.state = State::OnlyCallback;
                    false
                }
                State::OnlyResult => {
                    hot.context = context;
                    hot.callback = Some(Box::new(callback));
                    hot.state = State::Armed;
                    true
                }
                State::OnlyCallback | State::Armed | State::Done => {
                    return Err(CoreError::CallbackAlreadyInstalled);
                }
            }
        };
        if armed {
            self.maybe_fire();
        }
        Ok(())
    }

    /// Stores the executor the continuation should run on.
    ///
    /// Call only from the consumer side, and only while no dispatch is
    /// possible: before the callback is installed, or after it has already
    /// returned.
    pub(crate) fn set_executor(&self, executor: Option<Arc<dyn Executor>>, priority: i8) {
        let mut hot = self.hot.lock();
        debug_assert!(
            matches!(hot.state, State::Start | State::OnlyResult | State::Done),
            "set_executor while dispatch is possible (state {:?})",
            hot.state
        );
        hot.executor = executor;
        hot.priority = priority;
    }

    /// Returns the stored executor, if any. Consumed by the dispatch that
    /// fires the continuation.
    pub(crate) fn executor(&self) -> Option<Arc<dyn Executor>> {
        self.hot.lock().executor.clone()
    }

    /// Permits dispatch and attempts any deferred Armed -> Done transition.
    /// May call from any thread.
    pub(crate) fn activate(&self) {
        self.active.store(true, Ordering::Release);
        self.maybe_fire();
    }

    /// Suppresses dispatch until a later [`activate`](Self::activate). May
    /// call from any thread.
    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Reads the dispatch gate. May call from any thread.
    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Raises an advisory interrupt toward the producer. Call only from the
    /// consumer side.
    ///
    /// Ignored once a result exists or an interrupt was already raised. An
    /// installed handler is invoked synchronously under the interrupt mutex.
    pub(crate) fn raise(&self, failure: Failure) {
        let mut interrupt = self.interrupt.lock();
        if interrupt.interrupt.is_some() || self.has_result() {
            return;
        }
        interrupt.interrupt = Some(failure.clone());
        if let Some(handler) = interrupt.handler.take() {
            self.handler_present.store(false, Ordering::Relaxed);
            handler(failure);
        }
    }

    /// Fast check for a registered interrupt handler. May call from any
    /// thread.
    pub(crate) fn has_interrupt_handler(&self) -> bool {
        self.handler_present.load(Ordering::Acquire)
    }

    /// Consumer-side detach. Forces the core active (resolving a deferred
    /// Armed state), then releases one attachment.
    pub(crate) fn detach_consumer(ptr: CorePtr<T>) {
        ptr.core().activate();
        ptr.detach_one();
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// True once a result is present. May call from any thread.
    pub(crate) fn has_result(&self) -> bool {
        self.hot.lock().state.is_ready()
    }

    /// Clones out the stored outcome.
    ///
    /// Fails with [`CoreError::NotReady`] before the producer arrives and
    /// with [`CoreError::AlreadyDelivered`] once dispatch has moved the
    /// outcome into the callback.
    pub(crate) fn try_result(&self) -> Result<Outcome<T>, CoreError>
    where
        T: Clone,
    {
        let hot = self.hot.lock();
        if !hot.state.is_ready() {
            return Err(CoreError::NotReady);
        }
        hot.result.clone().ok_or(CoreError::AlreadyDelivered)
    }

    /// Borrows the stored outcome under the state mutex.
    ///
    /// `f` runs with a spin lock held; keep it brief. Same readiness errors
    /// as [`try_result`](Self::try_result).
    pub(crate) fn with_result<R>(&self, f: impl FnOnce(&Outcome<T>) -> R) -> Result<R, CoreError> {
        let hot = self.hot.lock();
        if !hot.state.is_ready() {
            return Err(CoreError::NotReady);
        }
        hot.result.as_ref().map(f).ok_or(CoreError::AlreadyDelivered)
    }

    // ── Dispatch ────────────────────────────────────────────────────────

    /// Attempts the Armed -> Done transition and fires the continuation.
    ///
    /// A no-op unless the state is `Armed` and the core is active. Exactly
    /// one caller can commit the transition; everything after the commit
    /// runs outside the state mutex.
    fn maybe_fire(&self) {
        enum Fire<T: Send + 'static> {
            Skip,
            Inline(Callback<T>, Outcome<T>, AmbientContext),
            Handoff(Arc<dyn Executor>, i8),
        }

        let fire = {
            let mut hot = self.hot.lock();
            if hot.state != State::Armed || !self.active.load(Ordering::Acquire) {
                Fire::Skip
            } else {
                hot.state = State::Done;
                // Taking the executor out here breaks the would-be cycle
                // core -> executor -> queued task -> core.
                match hot.executor.take() {
                    Some(executor) => Fire::Handoff(executor, hot.priority),
                    None => {
                        let (Some(callback), Some(outcome)) =
                            (hot.callback.take(), hot.result.take())
                        else {
                            unreachable!("armed core missing callback or result");
                        };
                        Fire::Inline(callback, outcome, mem::take(&mut hot.context))
                    }
                }
            }
        };

        match fire {
            Fire::Skip => {}
            Fire::Inline(callback, outcome, context) => {
                // One extra attachment covers the invocation, released on
                // every exit path including an unwinding callback.
                self.attached.fetch_add(1, Ordering::Relaxed);
                let _attachment = AttachmentGuard {
                    core: CorePtr::from_core(self),
                };
                let _scope = context.enter();
                callback(outcome);
            }
            Fire::Handoff(executor, priority) => self.handoff(&executor, priority),
        }
    }

    /// Hands the continuation to the executor, falling back to an inline
    /// invocation with a failure outcome if the enqueue is rejected.
    fn handoff(&self, executor: &Arc<dyn Executor>, priority: i8) {
        // The enqueued task reads the callback and result out of the core,
        // so both the core and the callback object must survive until the
        // task runs or is dropped. Count each twice and guard each pair:
        // one reference covers this scope, the other rides with the task.
        self.attached.fetch_add(2, Ordering::Relaxed);
        self.callback_refs.fetch_add(2, Ordering::Relaxed);
        let scope_ref = CoreCallbackRef {
            core: CorePtr::from_core(self),
        };
        let task_ref = CoreCallbackRef {
            core: CorePtr::from_core(self),
        };

        let task: Task = Box::new(move || {
            let core = task_ref.core.core();
            let (callback, outcome, context) = {
                let mut hot = core.hot.lock();
                let Some(callback) = hot.callback.take() else {
                    // A rejected enqueue already ran the callback inline; a
                    // spurious late run of this task delivers nothing.
                    return;
                };
                let Some(outcome) = hot.result.take() else {
                    return;
                };
                (callback, outcome, hot.context.clone())
            };
            let _scope = context.enter();
            callback(outcome);
        });

        let enqueued = if executor.num_priorities() == 1 {
            executor.enqueue(task)
        } else {
            executor.enqueue_with_priority(task, priority)
        };

        if let Err(error) = enqueued {
            emit(
                LogLevel::Error,
                LOG_TARGET,
                "executor rejected dispatch; running callback inline",
                vec![("error", error.to_string())],
            );
            // The continuation must still run exactly once. The stored
            // result is discarded in favor of an outcome that surfaces the
            // enqueue failure to the consumer.
            let (callback, context) = {
                let mut hot = self.hot.lock();
                hot.result = None;
                (hot.callback.take(), hot.context.clone())
            };
            if let Some(callback) = callback {
                let _scope = context.enter();
                callback(Outcome::failure(Failure::from(error)));
            }
        }
        // scope_ref drops here, releasing its callback reference and
        // attachment.
        drop(scope_ref);
    }

    /// Drops the callback object once the last in-flight reference to it is
    /// released.
    fn deref_callback(&self) {
        if self.callback_refs.fetch_sub(1, Ordering::AcqRel) == 1 {
            let callback = self.hot.lock().callback.take();
            drop(callback);
        }
    }
}

/// Non-owning pointer to a heap-allocated [`Core`].
///
/// Validity is guaranteed by the attachment count: a holder may dereference
/// only while it is covered by an attachment it has not yet released.
pub(crate) struct CorePtr<T: Send + 'static> {
    ptr: NonNull<Core<T>>,
}

impl<T: Send + 'static> CorePtr<T> {
    fn from_core(core: &Core<T>) -> Self {
        Self {
            ptr: NonNull::from(core),
        }
    }

    /// Borrows the core. The caller must be covered by an attachment.
    pub(crate) fn core(&self) -> &Core<T> {
        // Safety: the pointee is freed only when the attachment count hits
        // zero, and every holder of a `CorePtr` releases its attachment at
        // most once, after its last use of the pointer.
        unsafe { self.ptr.as_ref() }
    }

    /// Releases one attachment, freeing the core if it was the last.
    pub(crate) fn detach_one(&self) {
        let previous = self.core().attached.fetch_sub(1, Ordering::Release);
        debug_assert!(previous > 0, "attachment count underflow");
        if previous == 1 {
            fence(Ordering::Acquire);
            // Safety: the count reached zero, so no other holder remains;
            // the allocation came from `Box::leak` in `allocate_raw`.
            drop(unsafe { Box::from_raw(self.ptr.as_ptr()) });
        }
    }
}

impl<T: Send + 'static> Clone for CorePtr<T> {
    fn clone(&self) -> Self {
        Self { ptr: self.ptr }
    }
}

impl<T: Send + 'static> Copy for CorePtr<T> {}

// A `CorePtr` is only a capability to reach the shared core, whose interior
// is synchronized; moving or sharing the pointer itself is unrestricted once
// the payload is sendable.
unsafe impl<T: Send + 'static> Send for CorePtr<T> {}
unsafe impl<T: Send + 'static> Sync for CorePtr<T> {}

/// Scope guard releasing one attachment.
struct AttachmentGuard<T: Send + 'static> {
    core: CorePtr<T>,
}

impl<T: Send + 'static> Drop for AttachmentGuard<T> {
    fn drop(&mut self) {
        self.core.detach_one();
    }
}

/// Scope guard releasing one callback reference and one attachment, in that
/// order.
struct CoreCallbackRef<T: Send + 'static> {
    core: CorePtr<T>,
}

impl<T: Send + 'static> Drop for CoreCallbackRef<T> {
    fn drop(&mut self) {
        self.core.core().deref_callback();
        self.core.detach_one();
    }
}
