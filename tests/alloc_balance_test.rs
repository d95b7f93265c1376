//! Allocation balance across full core lifecycles.
//!
//! A counting allocator verifies that create/arm/dispatch/drop cycles leave
//! no live allocation behind, on every dispatch path. This binary holds a
//! single test so no concurrent test can disturb the live-byte counter.

mod common;
use common::RejectingExecutor;

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::Arc;
use tandem::observability::AmbientContext;
use tandem::{pair, Failure, PanicPayload, QueuedExecutor};

struct CountingAllocator;

static LIVE_BYTES: AtomicIsize = AtomicIsize::new(0);

#[allow(clippy::cast_possible_wrap)]
unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            LIVE_BYTES.fetch_add(layout.size() as isize, Ordering::SeqCst);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        LIVE_BYTES.fetch_sub(layout.size() as isize, Ordering::SeqCst);
    }
}

#[global_allocator]
static ALLOCATOR: CountingAllocator = CountingAllocator;

fn one_cycle_of_everything(round: usize) {
    // Producer first, inline dispatch.
    let (producer, consumer) = pair::<usize>();
    producer.set_value(round).unwrap();
    consumer.install_callback(move |outcome| {
        assert_eq!(outcome.value(), Some(&round));
    })
    .unwrap();
    drop((producer, consumer));

    // Consumer first, with an ambient context snapshot.
    let (producer, consumer) = pair::<String>();
    {
        let ctx = AmbientContext::new().with_field("round", round.to_string());
        let _scope = ctx.enter();
        consumer.install_callback(|outcome| assert!(outcome.is_success())).unwrap();
    }
    producer.set_value(format!("value-{round}")).unwrap();
    drop((producer, consumer));

    // Broken promise.
    let (producer, consumer) = pair::<Vec<u8>>();
    consumer
        .install_callback(|outcome| assert!(outcome.error().is_some_and(Failure::is_broken_promise)))
        .unwrap();
    drop(producer);
    drop(consumer);

    // Deactivated arming, resolved by activate.
    let (producer, consumer) = pair::<usize>();
    consumer.deactivate();
    producer.set_value(round).unwrap();
    consumer.install_callback(|_| {}).unwrap();
    consumer.activate();
    drop((producer, consumer));

    // Executor handoff, drained.
    let executor = Arc::new(QueuedExecutor::new());
    let (producer, consumer) = pair::<usize>();
    consumer.set_executor(Some(executor.clone()));
    consumer.install_callback(|_| {}).unwrap();
    producer.set_value(round).unwrap();
    executor.run_all();
    drop((producer, consumer));
    drop(executor);

    // Executor handoff, task dropped unrun.
    let executor = Arc::new(QueuedExecutor::new());
    let (producer, consumer) = pair::<usize>();
    consumer.set_executor(Some(executor.clone()));
    consumer.install_callback(|_| {}).unwrap();
    producer.set_value(round).unwrap();
    drop((producer, consumer));
    drop(executor);

    // Rejected enqueue, inline failure fallback.
    let (producer, consumer) = pair::<usize>();
    consumer.set_executor(Some(Arc::new(RejectingExecutor)));
    consumer.install_callback(|outcome| assert!(outcome.is_failure())).unwrap();
    producer.set_value(round).unwrap();
    drop((producer, consumer));

    // Interrupt rendezvous, both orders.
    let (producer, consumer) = pair::<usize>();
    consumer.raise(Failure::new(PanicPayload {
        message: "early".to_string(),
    }));
    producer.set_interrupt_handler(|failure| assert!(failure.is::<PanicPayload>()));
    drop((producer, consumer));

    let (producer, consumer) = pair::<usize>();
    producer.set_interrupt_handler(|failure| assert!(failure.is::<PanicPayload>()));
    consumer.raise(Failure::new(PanicPayload {
        message: "late".to_string(),
    }));
    drop((producer, consumer));
}

#[test]
fn lifecycles_leave_no_live_allocations() {
    // Warm up lazy structures (thread-local context stack, queue blocks).
    one_cycle_of_everything(0);

    let baseline = LIVE_BYTES.load(Ordering::SeqCst);
    for round in 1..=32 {
        one_cycle_of_everything(round);
    }
    let after = LIVE_BYTES.load(Ordering::SeqCst);

    assert_eq!(
        baseline, after,
        "core lifecycles must not leak ({} bytes drifted)",
        after - baseline
    );
}
