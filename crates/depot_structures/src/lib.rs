//! # depot_structures - Concurrent Data Structures
//!
//! Lock-sharded structures used by the scheduler and the asset registry:
//! - ThreadSafeMap: bucket-locked hash map with transparent key lookup
//! - WorkStealingQueue: double-ended queue, LIFO for the owner, FIFO for thieves

pub mod thread_safe_map;
pub mod work_stealing_queue;

pub use thread_safe_map::{ThreadSafeMap, DEFAULT_BUCKET_COUNT};
pub use work_stealing_queue::WorkStealingQueue;

pub mod prelude {
    pub use crate::thread_safe_map::ThreadSafeMap;
    pub use crate::work_stealing_queue::WorkStealingQueue;
}
