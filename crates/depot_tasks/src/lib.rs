//! # depot_tasks - Work-Stealing Scheduler
//!
//! A fixed pool of worker threads for blocking I/O and deserialization work:
//! - Task: move-only, type-erased unit of work
//! - TaskHandle: deferred result of a submitted task
//! - ThreadPool: per-worker LIFO queues, a shared overflow queue, stealing
//! - InterruptFlag / InterruptibleThread: cooperative cancellation
//!
//! ## Example
//!
//! ```ignore
//! use depot_tasks::ThreadPool;
//!
//! let pool = ThreadPool::with_threads(4)?;
//! let answer = pool.submit(|| 6 * 7);
//! assert_eq!(answer.wait()?, 42);
//! ```

pub mod deferred;
pub mod interrupt;
pub mod pool;
pub mod task;

pub use deferred::{deferred, Promise, TaskError, TaskHandle};
pub use interrupt::{
    current_flag, interruptible_wait, interruptible_wait_until, interruption_point,
    InterruptFlag, InterruptibleThread, Interrupted,
};
pub use pool::{PoolConfig, ThreadPool};
pub use task::Task;

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::deferred::{TaskError, TaskHandle};
    pub use crate::interrupt::{interruption_point, InterruptFlag, Interrupted};
    pub use crate::pool::{PoolConfig, ThreadPool};
}
