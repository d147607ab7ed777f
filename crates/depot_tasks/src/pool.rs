//! Work-stealing thread pool
//!
//! Every worker owns a [`WorkStealingQueue`]. Work submitted from inside a
//! worker goes to that worker's queue and runs most-recent-first; work
//! submitted from any other thread goes to a shared overflow channel. An idle
//! worker looks at its own queue, then the overflow channel, then steals the
//! oldest task of its siblings in round-robin order, and yields otherwise.
//!
//! Shutdown raises the stop flag and interrupts the workers. Tasks already
//! running finish (or bail out at an interruption point); tasks still queued
//! are dropped, which resolves their handles with [`TaskError::Abandoned`].

use core::fmt;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use depot_structures::WorkStealingQueue;

use crate::deferred::{deferred, TaskError, TaskHandle};
use crate::interrupt::InterruptibleThread;
use crate::task::{panic_message, Task};

/// Thread pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of workers; `None` uses the available hardware parallelism
    pub worker_threads: Option<usize>,
    /// Prefix for worker thread names
    pub thread_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            thread_name: "depot-worker".to_string(),
        }
    }
}

impl PoolConfig {
    /// Worker count after resolving `None`/zero to the hardware parallelism
    pub fn effective_threads(&self) -> usize {
        self.worker_threads
            .filter(|&n| n > 0)
            .unwrap_or_else(|| thread::available_parallelism().map_or(1, |n| n.get()))
    }
}

static NEXT_POOL_ID: AtomicUsize = AtomicUsize::new(1);

thread_local! {
    /// (pool id, worker index) when the current thread is a pool worker
    static CURRENT_WORKER: Cell<Option<(usize, usize)>> = const { Cell::new(None) };
}

/// State shared between the pool handle and its workers
struct PoolShared {
    id: usize,
    done: AtomicBool,
    local_queues: Vec<WorkStealingQueue<Task>>,
    overflow_tx: Sender<Task>,
    overflow_rx: Receiver<Task>,
}

impl PoolShared {
    fn find_task(&self, index: usize, cursor: &mut usize) -> Option<Task> {
        self.local_queues[index]
            .try_pop()
            .or_else(|| self.overflow_rx.try_recv().ok())
            .or_else(|| self.steal(index, cursor))
    }

    /// Steal from the siblings starting at `cursor`, then move the cursor on
    fn steal(&self, index: usize, cursor: &mut usize) -> Option<Task> {
        let count = self.local_queues.len();
        let start = *cursor;
        *cursor = next_victim(index, start, count);
        victims(index, start, count).find_map(|victim| self.local_queues[victim].try_steal())
    }

    /// Drop everything still queued. Returns how many tasks were abandoned.
    fn abandon_queued(&self) -> usize {
        let mut abandoned = 0;
        for queue in &self.local_queues {
            abandoned += queue.drain().len();
        }
        abandoned += self.overflow_rx.try_iter().count();
        abandoned
    }
}

/// Every worker index except `index`, going round from `start`
fn victims(index: usize, start: usize, count: usize) -> impl Iterator<Item = usize> {
    (0..count)
        .map(move |offset| (start + offset) % count)
        .filter(move |&victim| victim != index)
}

/// First victim of the next steal attempt
fn next_victim(index: usize, start: usize, count: usize) -> usize {
    victims(index, start + 1, count).next().unwrap_or(index)
}

fn worker_loop(shared: Arc<PoolShared>, index: usize) {
    CURRENT_WORKER.with(|w| w.set(Some((shared.id, index))));
    log::debug!("Pool {} worker {} started", shared.id, index);

    let mut cursor = next_victim(index, index, shared.local_queues.len());
    while !shared.done.load(Ordering::Acquire) {
        match shared.find_task(index, &mut cursor) {
            Some(task) => task.run(),
            None => thread::yield_now(),
        }
    }

    CURRENT_WORKER.with(|w| w.set(None));
    log::debug!("Pool {} worker {} stopped", shared.id, index);
}

/// Fixed-size pool of worker threads
pub struct ThreadPool {
    shared: Arc<PoolShared>,
    workers: Vec<InterruptibleThread>,
}

impl ThreadPool {
    /// Spawn a pool
    pub fn new(config: PoolConfig) -> std::io::Result<Self> {
        let count = config.effective_threads();
        let (overflow_tx, overflow_rx) = crossbeam_channel::unbounded();

        let shared = Arc::new(PoolShared {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            done: AtomicBool::new(false),
            local_queues: (0..count).map(|_| WorkStealingQueue::new()).collect(),
            overflow_tx,
            overflow_rx,
        });

        let mut pool = Self {
            shared,
            workers: Vec::with_capacity(count),
        };

        // On a spawn failure `pool` is dropped here, which stops the workers
        // spawned so far.
        for index in 0..count {
            let shared = Arc::clone(&pool.shared);
            let name = format!("{}-{}", config.thread_name, index);
            let worker = InterruptibleThread::spawn(name, move || worker_loop(shared, index))?;
            pool.workers.push(worker);
        }

        log::info!("Thread pool {} started with {} workers", pool.shared.id, count);
        Ok(pool)
    }

    /// Spawn a pool with `count` workers (zero means hardware parallelism)
    pub fn with_threads(count: usize) -> std::io::Result<Self> {
        Self::new(PoolConfig {
            worker_threads: Some(count),
            ..PoolConfig::default()
        })
    }

    /// Queue `f` for execution and return a handle to its result
    ///
    /// Never blocks. A panic inside `f` resolves the handle with
    /// [`TaskError::Panicked`] and leaves the worker running.
    pub fn submit<F, T>(&self, f: F) -> TaskHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (promise, handle) = deferred();

        self.schedule(Task::new(move || {
            match panic::catch_unwind(AssertUnwindSafe(f)) {
                Ok(value) => promise.fulfill(value),
                Err(payload) => {
                    let message = panic_message(&*payload);
                    log::error!("Task panicked: {}", message);
                    promise.fail(TaskError::Panicked(message));
                }
            }
        }));

        handle
    }

    fn schedule(&self, task: Task) {
        if self.shared.done.load(Ordering::Acquire) {
            log::warn!("Task submitted to stopped pool {}; abandoning it", self.shared.id);
            return;
        }

        match CURRENT_WORKER.with(Cell::get) {
            Some((pool_id, index)) if pool_id == self.shared.id => {
                self.shared.local_queues[index].push(task);
            }
            _ => {
                // The receiver lives in `shared`, so the channel is never disconnected
                let _ = self.shared.overflow_tx.send(task);
            }
        }
    }

    /// Number of worker threads
    pub fn worker_count(&self) -> usize {
        self.shared.local_queues.len()
    }

    /// Check if the pool still accepts work
    pub fn is_running(&self) -> bool {
        !self.shared.done.load(Ordering::Acquire)
    }

    /// Approximate number of queued, not yet started tasks
    pub fn queued_count(&self) -> usize {
        self.shared.local_queues.iter().map(|q| q.len()).sum::<usize>()
            + self.shared.overflow_rx.len()
    }

    /// Stop the workers and abandon queued tasks
    pub fn shutdown(&mut self) {
        if self.shared.done.swap(true, Ordering::AcqRel) {
            return;
        }

        for worker in &self.workers {
            worker.interrupt();
        }

        let current = thread::current().id();
        for worker in self.workers.drain(..) {
            if worker.thread_id() == Some(current) {
                // Last owner dropped from inside a task: can not join ourselves
                worker.detach();
                continue;
            }
            let name = worker.name().to_string();
            if let Err(payload) = worker.join() {
                log::error!("Worker '{}' panicked: {}", name, panic_message(&*payload));
            }
        }

        let abandoned = self.shared.abandon_queued();
        log::info!(
            "Thread pool {} shut down ({} queued tasks abandoned)",
            self.shared.id,
            abandoned
        );
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("id", &self.shared.id)
            .field("workers", &self.worker_count())
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_threads() {
        let config = PoolConfig {
            worker_threads: Some(3),
            ..PoolConfig::default()
        };
        assert_eq!(config.effective_threads(), 3);

        let auto = PoolConfig {
            worker_threads: Some(0),
            ..PoolConfig::default()
        };
        assert!(auto.effective_threads() >= 1);
    }

    #[test]
    fn test_steal_order_rotates() {
        assert_eq!(victims(0, 1, 4).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(victims(0, 3, 4).collect::<Vec<_>>(), vec![3, 1, 2]);
        assert_eq!(victims(2, 2, 4).collect::<Vec<_>>(), vec![3, 0, 1]);
        assert_eq!(victims(0, 0, 1).count(), 0);

        // Worker 0 of 4 starts at 1 and never picks itself
        let mut cursor = next_victim(0, 0, 4);
        let mut firsts = Vec::new();
        for _ in 0..4 {
            firsts.push(cursor);
            cursor = next_victim(0, cursor, 4);
        }
        assert_eq!(firsts, vec![1, 2, 3, 1]);
        assert_eq!(next_victim(0, 0, 1), 0);
    }

    #[test]
    fn test_submit_and_wait() {
        let pool = ThreadPool::with_threads(2).unwrap();
        let handle = pool.submit(|| 6 * 7);
        assert_eq!(handle.wait(), Ok(42));
        assert_eq!(pool.worker_count(), 2);
    }

    #[test]
    fn test_submit_after_shutdown_is_abandoned() {
        let mut pool = ThreadPool::with_threads(1).unwrap();
        pool.shutdown();
        assert!(!pool.is_running());

        let handle = pool.submit(|| 1);
        assert_eq!(handle.wait(), Err(TaskError::Abandoned));
    }
}
