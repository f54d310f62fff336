//! Object pools backed by the segment-chained queues.
//!
//! A pool is an acquire/release cache: `release` hands an object back for
//! reuse, `acquire` prefers a pooled object and falls back, in order, to a
//! per-call factory override, the pool's configured factory, and an opted-in
//! `Default` fallback before reporting [`Error::Unavailable`].
//!
//! [`Error::Unavailable`]: crate::error::Error::Unavailable

pub mod concurrent;
pub mod keyed;
pub mod unsync;

pub use concurrent::ConcurrentPool;
pub use keyed::{ConcurrentKeyedPool, KeyedPool};
pub use unsync::Pool;

use crate::error::Result;

/// Acquire/release contract shared by both pool variants.
///
/// Factory parameters are `&dyn Fn` rather than generics so the trait stays
/// object-safe; registries hold pools as trait objects.
pub trait ObjectPool<T> {
    /// Number of pooled (idle) objects.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the pool may be shared across threads. Generic code can
    /// branch on this instead of downcasting.
    fn is_thread_safe(&self) -> bool;

    /// Takes a pooled object, or manufactures one through the fallback
    /// chain, failing with `Unavailable` when no source exists.
    fn acquire(&self) -> Result<T>;

    fn try_acquire(&self) -> Option<T>;

    /// Takes a pooled object, or builds one with `factory`. The override
    /// wins over the pool's own configured sources and never fails.
    fn acquire_with(&self, factory: &dyn Fn() -> T) -> T;

    /// Hands an object back for reuse. Never fails; the backing queue is
    /// unbounded.
    fn release(&self, item: T);
}

/// Keyed variant: objects are cached per key, buckets are created lazily.
pub trait KeyedObjectPool<K, T> {
    /// Number of pooled objects under `key`.
    fn count(&self, key: &K) -> usize;

    fn is_thread_safe(&self) -> bool;

    fn acquire(&self, key: &K) -> Result<T>;

    fn try_acquire(&self, key: &K) -> Option<T>;

    fn acquire_with(&self, key: &K, factory: &dyn Fn(&K) -> T) -> T;

    fn release(&self, key: K, item: T);
}

/// Marker for pools a process-wide registry may hold.
pub trait SharedPool<T>: ObjectPool<T> + Send + Sync {}

impl<T, P> SharedPool<T> for P where P: ObjectPool<T> + Send + Sync {}

/// Marker for keyed pools a process-wide registry may hold.
pub trait SharedKeyedPool<K, T>: KeyedObjectPool<K, T> + Send + Sync {}

impl<K, T, P> SharedKeyedPool<K, T> for P where P: KeyedObjectPool<K, T> + Send + Sync {}
