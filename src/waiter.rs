//! Awaiting a promise from async code.
//!
//! A [`Waiter`] is a [`Future`] view of a promise, layered entirely on top of
//! callback registration: delivery stores the outcome in a shared slot and
//! wakes the task. The promise state machine itself never blocks and knows
//! nothing about wakers.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;
use thiserror::Error;

use crate::context;
use crate::promise::{shared_error, Promise, SharedError};

/// Raised when the promise behind a [`Waiter`] goes away before resolving.
#[derive(Debug, Error)]
pub enum WaiterError {
    /// Every handle to the promise was dropped (or delivery was invalidated)
    /// while it was still pending, so no outcome will ever arrive.
    #[error("the promise was dropped before it was resolved")]
    PromiseDropped,
}

struct Slot<V> {
    outcome: Option<Result<V, SharedError>>,
    waker: Option<Waker>,
}

/// A [`Future`] that resolves with the outcome of a promise.
///
/// ```
/// use futures::executor::block_on;
/// use std::thread;
/// use gangway::Promise;
///
/// let promise: Promise<String> = Promise::pending("greeting");
/// let waiter = promise.waiter();
/// let producer = promise.clone();
/// thread::spawn(move || producer.fulfill("hi".to_owned()));
/// assert_eq!(block_on(waiter).unwrap(), "hi");
/// ```
pub struct Waiter<V> {
    slot: Arc<Mutex<Slot<V>>>,
}

/// Held by both registered callbacks. Once neither can fire any more, the
/// waiting task is woken with [`WaiterError::PromiseDropped`] instead of
/// hanging forever.
struct DeliveryGuard<V> {
    slot: Arc<Mutex<Slot<V>>>,
}

impl<V> DeliveryGuard<V> {
    fn deliver(&self, outcome: Result<V, SharedError>) {
        let mut slot = self.slot.lock();
        if slot.outcome.is_none() {
            slot.outcome = Some(outcome);
        }
        if let Some(waker) = slot.waker.take() {
            waker.wake();
        }
    }
}

impl<V> Drop for DeliveryGuard<V> {
    fn drop(&mut self) {
        self.deliver(Err(shared_error(WaiterError::PromiseDropped)));
    }
}

impl<V: Clone + Send + 'static> Promise<V> {
    /// Registers an observer and returns a future resolving with this
    /// promise's outcome. Counts as a rejection handler.
    ///
    /// Delivery happens inline on the resolving thread; the future is woken
    /// from there.
    pub fn waiter(&self) -> Waiter<V> {
        let slot = Arc::new(Mutex::new(Slot {
            outcome: None,
            waker: None,
        }));
        let guard = Arc::new(DeliveryGuard { slot: slot.clone() });
        let on_fulfilled = guard.clone();
        let on_rejected = guard;
        self.then_on(
            &context::immediate(),
            move |value| on_fulfilled.deliver(Ok(value)),
            move |error| on_rejected.deliver(Err(error)),
        );
        Waiter { slot }
    }
}

impl<V> Future for Waiter<V> {
    type Output = Result<V, SharedError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.slot.lock();
        match slot.outcome.take() {
            Some(outcome) => Poll::Ready(outcome),
            None => {
                slot.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::thread;

    #[test]
    fn waiter_sees_fulfillment() {
        let promise: Promise<i32> = Promise::pending("test");
        let waiter = promise.waiter();
        let producer = promise.clone();
        let handle = thread::spawn(move || producer.fulfill(9));
        assert_eq!(block_on(waiter).unwrap(), 9);
        handle.join().expect("the producer thread has panicked");
    }

    #[test]
    fn waiter_sees_rejection() {
        #[derive(Debug, thiserror::Error)]
        #[error("nope")]
        struct Nope;

        let promise: Promise<i32> = Promise::pending("test");
        let waiter = promise.waiter();
        promise.reject(shared_error(Nope));
        let error = block_on(waiter).unwrap_err();
        assert!(error.downcast_ref::<Nope>().is_some());
    }

    #[test]
    fn dropped_promise_resolves_the_waiter() {
        let promise: Promise<i32> = Promise::pending("dropped");
        let waiter = promise.waiter();
        drop(promise);
        let error = block_on(waiter).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<WaiterError>(),
            Some(WaiterError::PromiseDropped)
        ));
    }
}
