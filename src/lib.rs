//! Segment-chained FIFO queues and the object pools built on them.
//!
//! The queues are unbounded: storage is a chain of fixed-size ring segments,
//! grown one segment at a time and recycled once drained, so steady-state
//! traffic allocates nothing. [`Queue`] is the single-threaded variant;
//! [`ConcurrentQueue`] is lock-free MPMC. [`Pool`], [`ConcurrentPool`] and
//! the keyed variants layer acquire/release object reuse on top, and the
//! [`registry`] module provides process-wide directories so unrelated call
//! sites can share pools by element type.
//!
//! ```
//! use ringpool::pool::{ConcurrentPool, ObjectPool};
//!
//! let pool = ConcurrentPool::with_factory(|| Vec::<u8>::with_capacity(1024));
//! let mut buffer = pool.acquire()?;
//! buffer.extend_from_slice(b"scratch");
//! buffer.clear();
//! pool.release(buffer);
//! assert_eq!(pool.len(), 1);
//! # Ok::<(), ringpool::Error>(())
//! ```

pub mod chain;
pub mod defaults;
pub mod error;
pub mod pool;
pub mod queue;
pub mod registry;
pub mod segment;

pub use error::{Error, Result};
pub use pool::{
    ConcurrentKeyedPool, ConcurrentPool, KeyedObjectPool, KeyedPool, ObjectPool, Pool,
    SharedKeyedPool, SharedPool,
};
pub use queue::{ConcurrentQueue, Fifo, Queue};
pub use registry::{KeyedPoolRegistry, PoolRegistry};
