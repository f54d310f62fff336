//! Thread-safe pool.

use crate::error::{Error, Result};
use crate::pool::ObjectPool;
use crate::queue::ConcurrentQueue;

type Factory<T> = Box<dyn Fn() -> T + Send + Sync>;

/// Thread-safe object pool backed by a [`ConcurrentQueue`]. Acquire and
/// release are lock-free; the factory runs outside any synchronization, so
/// concurrent acquires on an empty pool may each manufacture an object.
pub struct ConcurrentPool<T> {
    queue: ConcurrentQueue<T>,
    factory: Option<Factory<T>>,
    fallback: Option<Factory<T>>,
}

impl<T> ConcurrentPool<T> {
    /// Creates an empty pool with no factory; `acquire` on an empty pool
    /// fails with `Unavailable` unless a fallback is configured.
    pub fn new() -> Self {
        Self::build(ConcurrentQueue::new(), None)
    }

    pub fn with_segment_size(segment_size: usize) -> Result<Self> {
        Ok(Self::build(
            ConcurrentQueue::with_segment_size(segment_size)?,
            None,
        ))
    }

    /// Creates a pool that manufactures objects with `factory` when empty.
    pub fn with_factory(factory: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self::build(ConcurrentQueue::new(), Some(Box::new(factory)))
    }

    pub fn with_factory_and_segment_size(
        factory: impl Fn() -> T + Send + Sync + 'static,
        segment_size: usize,
    ) -> Result<Self> {
        Ok(Self::build(
            ConcurrentQueue::with_segment_size(segment_size)?,
            Some(Box::new(factory)),
        ))
    }

    /// Falls back to `T::default()` when the pool is empty and no factory
    /// (or per-call override) applies.
    pub fn with_default_fallback(mut self) -> Self
    where
        T: Default + 'static,
    {
        self.fallback = Some(Box::new(T::default));
        self
    }

    fn build(queue: ConcurrentQueue<T>, factory: Option<Factory<T>>) -> Self {
        ConcurrentPool {
            queue,
            factory,
            fallback: None,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn acquire(&self) -> Result<T> {
        self.try_acquire().ok_or(Error::Unavailable)
    }

    /// Pooled object, else configured factory, else fallback, else `None`.
    pub fn try_acquire(&self) -> Option<T> {
        self.queue
            .try_dequeue()
            .or_else(|| self.factory.as_ref().map(|make| make()))
            .or_else(|| self.fallback.as_ref().map(|make| make()))
    }

    pub fn acquire_with(&self, factory: &dyn Fn() -> T) -> T {
        self.queue.try_dequeue().unwrap_or_else(factory)
    }

    pub fn release(&self, item: T) {
        self.queue.enqueue(item);
    }
}

impl<T> Default for ConcurrentPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ObjectPool<T> for ConcurrentPool<T> {
    fn len(&self) -> usize {
        ConcurrentPool::len(self)
    }

    fn is_thread_safe(&self) -> bool {
        true
    }

    fn acquire(&self) -> Result<T> {
        ConcurrentPool::acquire(self)
    }

    fn try_acquire(&self) -> Option<T> {
        ConcurrentPool::try_acquire(self)
    }

    fn acquire_with(&self, factory: &dyn Fn() -> T) -> T {
        ConcurrentPool::acquire_with(self, factory)
    }

    fn release(&self, item: T) {
        ConcurrentPool::release(self, item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn release_then_acquire_returns_the_pooled_object() {
        let pool = ConcurrentPool::new();
        pool.release(String::from("reused"));
        assert_eq!(pool.acquire(), Ok(String::from("reused")));
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn empty_pool_without_factory_is_unavailable() {
        let pool = ConcurrentPool::<String>::new();
        assert_eq!(pool.acquire(), Err(Error::Unavailable));
    }

    #[test]
    fn fallback_chain_is_override_then_factory_then_default() {
        let pool = ConcurrentPool::with_factory(|| 1).with_default_fallback();
        assert_eq!(pool.acquire_with(&|| 2), 2);
        assert_eq!(pool.acquire(), Ok(1));
        pool.release(3);
        assert_eq!(pool.acquire(), Ok(3));
    }

    #[test]
    fn reports_thread_safe() {
        let pool = ConcurrentPool::<u32>::new();
        assert!(ObjectPool::is_thread_safe(&pool));
    }

    #[test]
    fn concurrent_release_and_acquire_conserve_objects() {
        let pool = Arc::new(ConcurrentPool::new());
        for value in 0..64u32 {
            pool.release(value);
        }

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        if let Some(value) = pool.try_acquire() {
                            pool.release(value);
                        }
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(pool.len(), 64);
    }
}
