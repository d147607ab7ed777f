//! Deferred results
//!
//! A [`Promise`] travels with a task; the matching [`TaskHandle`] stays with
//! the submitter. A promise dropped without a value resolves its handle with
//! [`TaskError::Abandoned`], which is how unstarted work reports shutdown.

use core::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use crate::interrupt::{current_flag, Interrupted};

/// Failure of a submitted task
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The task panicked; the panic was contained on the worker
    #[error("Task panicked: {0}")]
    Panicked(String),

    /// The task was dropped before it ran
    #[error("Task was abandoned before it ran")]
    Abandoned,
}

enum Slot<T> {
    Pending,
    Ready(Result<T, TaskError>),
    Taken,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    ready: Arc<Condvar>,
}

/// Create a connected promise/handle pair
pub fn deferred<T>() -> (Promise<T>, TaskHandle<T>) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(Slot::Pending),
        ready: Arc::new(Condvar::new()),
    });

    (
        Promise {
            shared: Some(Arc::clone(&shared)),
        },
        TaskHandle { shared },
    )
}

/// Producer side of a deferred result
pub struct Promise<T> {
    shared: Option<Arc<Shared<T>>>,
}

impl<T> Promise<T> {
    /// Resolve with a value
    pub fn fulfill(mut self, value: T) {
        self.complete(Ok(value));
    }

    /// Resolve with an error
    pub fn fail(mut self, error: TaskError) {
        self.complete(Err(error));
    }

    fn complete(&mut self, outcome: Result<T, TaskError>) {
        if let Some(shared) = self.shared.take() {
            *shared.slot.lock() = Slot::Ready(outcome);
            shared.ready.notify_all();
        }
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        self.complete(Err(TaskError::Abandoned));
    }
}

/// Consumer side of a deferred result
pub struct TaskHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> TaskHandle<T> {
    /// Check if the result is available without blocking
    pub fn is_ready(&self) -> bool {
        matches!(*self.shared.slot.lock(), Slot::Ready(_))
    }

    /// Block until the result is available
    pub fn wait(self) -> Result<T, TaskError> {
        let mut slot = self.shared.slot.lock();
        while matches!(*slot, Slot::Pending) {
            self.shared.ready.wait(&mut slot);
        }
        take(&mut slot)
    }

    /// Block for at most `timeout`. Returns whether the result is available.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let mut slot = self.shared.slot.lock();
        if matches!(*slot, Slot::Pending) {
            self.shared.ready.wait_for(&mut slot, timeout);
        }
        matches!(*slot, Slot::Ready(_))
    }

    /// Block until the result is available or the calling thread is interrupted
    ///
    /// On interruption the result is discarded.
    pub fn wait_interruptible(self) -> Result<Result<T, TaskError>, Interrupted> {
        let flag = current_flag();
        let mut slot = self.shared.slot.lock();
        flag.wait_until(&self.shared.ready, &mut slot, |slot| {
            !matches!(slot, Slot::Pending)
        })?;
        Ok(take(&mut slot))
    }
}

fn take<T>(slot: &mut Slot<T>) -> Result<T, TaskError> {
    match std::mem::replace(slot, Slot::Taken) {
        Slot::Ready(outcome) => outcome,
        Slot::Pending | Slot::Taken => Err(TaskError::Abandoned),
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("ready", &self.is_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fulfill_then_wait() {
        let (promise, handle) = deferred();
        promise.fulfill(42);
        assert!(handle.is_ready());
        assert_eq!(handle.wait(), Ok(42));
    }

    #[test]
    fn test_dropped_promise_abandons() {
        let (promise, handle) = deferred::<u32>();
        drop(promise);
        assert_eq!(handle.wait(), Err(TaskError::Abandoned));
    }

    #[test]
    fn test_cross_thread_wait() {
        let (promise, handle) = deferred();
        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            promise.fulfill("done".to_string());
        });
        assert_eq!(handle.wait().as_deref(), Ok("done"));
        producer.join().unwrap();
    }

    #[test]
    fn test_wait_for_times_out() {
        let (promise, handle) = deferred::<()>();
        assert!(!handle.wait_for(Duration::from_millis(5)));
        promise.fail(TaskError::Panicked("bad".into()));
        assert!(handle.wait_for(Duration::from_millis(5)));
        assert_eq!(handle.wait(), Err(TaskError::Panicked("bad".into())));
    }
}
