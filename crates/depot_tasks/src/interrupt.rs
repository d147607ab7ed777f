//! Cooperative cancellation
//!
//! Every thread owns an [`InterruptFlag`]. Setting it does nothing by itself:
//! the target thread notices on its next [`interruption_point`] or while it is
//! parked in an interruptible wait, which the flag knows how to wake.
//!
//! Interruptible waits re-arm in short slices, so a `set` racing with the
//! start of a wait is picked up within one slice.

use core::fmt;
use std::cell::OnceCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};
use thiserror::Error;

const WAIT_SLICE: Duration = Duration::from_millis(1);

/// Raised at an interruption point when the thread's flag is set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("thread was interrupted")]
pub struct Interrupted;

/// Explicit cancellation token
pub struct InterruptFlag {
    set: AtomicBool,
    /// Condition variable the owning thread is currently parked on
    parked_on: Mutex<Option<Arc<Condvar>>>,
}

impl InterruptFlag {
    /// Create a cleared flag
    pub fn new() -> Self {
        Self {
            set: AtomicBool::new(false),
            parked_on: Mutex::new(None),
        }
    }

    /// Raise the flag and wake the owner if it is in an interruptible wait
    pub fn set(&self) {
        self.set.store(true, Ordering::SeqCst);
        if let Some(condvar) = self.parked_on.lock().as_ref() {
            condvar.notify_all();
        }
    }

    /// Lower the flag
    pub fn clear(&self) {
        self.set.store(false, Ordering::SeqCst);
    }

    /// Check if the flag is raised
    pub fn is_set(&self) -> bool {
        self.set.load(Ordering::SeqCst)
    }

    /// Interruption point for this token
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.is_set() {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }

    /// Wait once on `condvar`, returning early if the flag is raised
    ///
    /// Like any condition variable wait this may return spuriously; callers
    /// re-check their condition. Use [`InterruptFlag::wait_until`] for a loop.
    pub fn wait<T>(
        &self,
        condvar: &Arc<Condvar>,
        guard: &mut MutexGuard<'_, T>,
    ) -> Result<(), Interrupted> {
        self.check()?;
        *self.parked_on.lock() = Some(Arc::clone(condvar));
        let _parked = Parked(self);
        condvar.wait_for(guard, WAIT_SLICE);
        self.check()
    }

    /// Wait until `done` holds for the guarded value, or the flag is raised
    pub fn wait_until<T, F>(
        &self,
        condvar: &Arc<Condvar>,
        guard: &mut MutexGuard<'_, T>,
        mut done: F,
    ) -> Result<(), Interrupted>
    where
        F: FnMut(&mut T) -> bool,
    {
        while !done(&mut **guard) {
            self.wait(condvar, guard)?;
        }
        Ok(())
    }
}

impl Default for InterruptFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InterruptFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterruptFlag")
            .field("set", &self.is_set())
            .finish()
    }
}

/// Unregisters the condition variable when the wait ends
struct Parked<'a>(&'a InterruptFlag);

impl Drop for Parked<'_> {
    fn drop(&mut self) {
        *self.0.parked_on.lock() = None;
    }
}

thread_local! {
    static THREAD_FLAG: OnceCell<Arc<InterruptFlag>> = const { OnceCell::new() };
}

/// The calling thread's interrupt flag
pub fn current_flag() -> Arc<InterruptFlag> {
    THREAD_FLAG.with(|cell| Arc::clone(cell.get_or_init(|| Arc::new(InterruptFlag::new()))))
}

fn install_flag(flag: Arc<InterruptFlag>) {
    THREAD_FLAG.with(|cell| {
        if cell.set(flag).is_err() {
            log::warn!("Interrupt flag already installed on this thread");
        }
    });
}

/// Fail with [`Interrupted`] if the calling thread has been interrupted
pub fn interruption_point() -> Result<(), Interrupted> {
    THREAD_FLAG.with(|cell| cell.get().map_or(Ok(()), |flag| flag.check()))
}

/// [`InterruptFlag::wait`] on the calling thread's flag
pub fn interruptible_wait<T>(
    condvar: &Arc<Condvar>,
    guard: &mut MutexGuard<'_, T>,
) -> Result<(), Interrupted> {
    current_flag().wait(condvar, guard)
}

/// [`InterruptFlag::wait_until`] on the calling thread's flag
pub fn interruptible_wait_until<T, F>(
    condvar: &Arc<Condvar>,
    guard: &mut MutexGuard<'_, T>,
    done: F,
) -> Result<(), Interrupted>
where
    F: FnMut(&mut T) -> bool,
{
    current_flag().wait_until(condvar, guard, done)
}

/// A thread whose interrupt flag can be raised from outside
///
/// Dropping the wrapper interrupts the thread and joins it.
pub struct InterruptibleThread {
    name: String,
    flag: Arc<InterruptFlag>,
    handle: Option<JoinHandle<()>>,
}

impl InterruptibleThread {
    /// Spawn a named thread with a fresh interrupt flag
    pub fn spawn<F>(name: impl Into<String>, f: F) -> std::io::Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = name.into();
        let flag = Arc::new(InterruptFlag::new());
        let thread_flag = Arc::clone(&flag);

        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            install_flag(thread_flag);
            f();
        })?;

        Ok(Self {
            name,
            flag,
            handle: Some(handle),
        })
    }

    /// Raise this thread's interrupt flag
    pub fn interrupt(&self) {
        self.flag.set();
    }

    /// The thread's interrupt flag
    pub fn flag(&self) -> &Arc<InterruptFlag> {
        &self.flag
    }

    /// Thread name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// OS thread id, while the thread is still owned
    pub fn thread_id(&self) -> Option<ThreadId> {
        self.handle.as_ref().map(|h| h.thread().id())
    }

    /// Check if the thread has returned
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Wait for the thread to return
    pub fn join(mut self) -> thread::Result<()> {
        match self.handle.take() {
            Some(handle) => handle.join(),
            None => Ok(()),
        }
    }

    /// Let the thread run on without an owner
    pub fn detach(mut self) {
        self.handle.take();
    }
}

impl Drop for InterruptibleThread {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.flag.set();
            if handle.join().is_err() {
                log::error!("Thread '{}' panicked", self.name);
            }
        }
    }
}

impl fmt::Debug for InterruptibleThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterruptibleThread")
            .field("name", &self.name)
            .field("interrupted", &self.flag.is_set())
            .finish()
    }
}
