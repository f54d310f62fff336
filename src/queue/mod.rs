//! Unbounded segment-chained FIFO queues.

pub mod concurrent;
pub mod unsync;

pub use concurrent::ConcurrentQueue;
pub use unsync::Queue;

use crate::error::Result;

/// Unbounded FIFO contract shared by the single-threaded and lock-free
/// queues. Enqueuing never fails; the queue grows by chaining segments.
pub trait Fifo<T> {
    /// Number of queued items. Explicitly tracked, never derived from
    /// segment state; approximate while concurrent operations are in flight.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn enqueue(&self, item: T);

    /// Removes the oldest item, failing with `Underflow` when empty.
    fn dequeue(&self) -> Result<T>;

    fn try_dequeue(&self) -> Option<T>;

    /// Clones the oldest item without removing it, failing with `Underflow`
    /// when empty.
    fn peek(&self) -> Result<T>
    where
        T: Clone;

    fn try_peek(&self) -> Option<T>
    where
        T: Clone;
}
