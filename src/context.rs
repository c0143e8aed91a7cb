//! Places where promise callbacks run.
//!
//! An [`ExecutionContext`] accepts a zero-argument unit of work and executes
//! it now, later, or never. Delivery of every promise callback goes through
//! the context it was registered with, so an observer can choose where its
//! handlers run independently of where the promise is resolved.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, OnceLock};
use std::thread;

use parking_lot::Mutex;

/// A unit of work submitted to an [`ExecutionContext`].
pub type Work = Box<dyn FnOnce() + Send>;

/// A place work can be scheduled.
pub trait ExecutionContext: Send + Sync {
    fn execute(&self, work: Work);
}

/// Runs work inline on the calling thread.
pub struct Immediate;

impl ExecutionContext for Immediate {
    fn execute(&self, work: Work) {
        work()
    }
}

/// A dedicated worker thread that runs submitted work one piece at a time,
/// in submission order.
pub struct Serial {
    sender: Mutex<Sender<Work>>,
}

impl Serial {
    pub fn new() -> Self {
        let (sender, receiver) = channel::<Work>();
        thread::spawn(move || {
            while let Ok(work) = receiver.recv() {
                work();
            }
        });
        Self {
            sender: Mutex::new(sender),
        }
    }
}

impl Default for Serial {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext for Serial {
    fn execute(&self, work: Work) {
        // A closed channel means the worker is gone; the work is dropped,
        // as with an invalidated context.
        let _ = self.sender.lock().send(work);
    }
}

/// One thread per unit of work. Stands in for a concurrent background queue.
pub struct Spawn;

impl ExecutionContext for Spawn {
    fn execute(&self, work: Work) {
        thread::spawn(work);
    }
}

/// Wraps another context and can be permanently disabled. After
/// [`invalidate`](Invalidatable::invalidate), submitted work is dropped
/// instead of executed.
///
/// This cancels *delivery* to one observer without cancelling the underlying
/// asynchronous operation, and without affecting other observers of the same
/// promise.
pub struct Invalidatable {
    valid: AtomicBool,
    inner: Arc<dyn ExecutionContext>,
}

impl Invalidatable {
    pub fn new(inner: Arc<dyn ExecutionContext>) -> Self {
        Self {
            valid: AtomicBool::new(true),
            inner,
        }
    }

    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }
}

impl ExecutionContext for Invalidatable {
    fn execute(&self, work: Work) {
        if !self.is_valid() {
            return;
        }
        self.inner.execute(work)
    }
}

/// The process-wide default delivery context: a lazily-created serial worker
/// standing in for a platform main queue.
pub fn default_context() -> Arc<dyn ExecutionContext> {
    static DEFAULT: OnceLock<Arc<Serial>> = OnceLock::new();
    DEFAULT.get_or_init(|| Arc::new(Serial::new())).clone()
}

/// A shared handle to the inline context.
pub fn immediate() -> Arc<dyn ExecutionContext> {
    static IMMEDIATE: OnceLock<Arc<Immediate>> = OnceLock::new();
    IMMEDIATE.get_or_init(|| Arc::new(Immediate)).clone()
}

/// A shared handle to the thread-per-work context.
pub fn spawn() -> Arc<dyn ExecutionContext> {
    static SPAWN: OnceLock<Arc<Spawn>> = OnceLock::new();
    SPAWN.get_or_init(|| Arc::new(Spawn)).clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;
    use std::time::Duration;

    #[test]
    fn immediate_runs_inline() {
        let (sender, receiver) = channel();
        Immediate.execute(Box::new(move || {
            let _ = sender.send(());
        }));
        assert!(receiver.try_recv().is_ok());
    }

    #[test]
    fn serial_runs_in_submission_order() {
        let context = Serial::new();
        let (sender, receiver) = channel();
        for n in 0..8 {
            let sender = sender.clone();
            context.execute(Box::new(move || {
                let _ = sender.send(n);
            }));
        }
        let seen: Vec<i32> = receiver.iter().take(8).collect();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn spawn_runs_the_work() {
        let (sender, receiver) = channel();
        Spawn.execute(Box::new(move || {
            let _ = sender.send(());
        }));
        assert!(receiver.recv_timeout(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn invalidated_context_drops_work() {
        let context = Invalidatable::new(immediate());
        let (sender, receiver) = channel();
        {
            let sender = sender.clone();
            context.execute(Box::new(move || {
                let _ = sender.send("before");
            }));
        }
        context.invalidate();
        context.execute(Box::new(move || {
            let _ = sender.send("after");
        }));
        assert_eq!(receiver.try_recv(), Ok("before"));
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn default_context_is_shared() {
        assert!(Arc::ptr_eq(&default_context(), &default_context()));
    }
}
