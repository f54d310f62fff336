//! Single-threaded pool.

use crate::error::{Error, Result};
use crate::pool::ObjectPool;
use crate::queue::Queue;

type Factory<T> = Box<dyn Fn() -> T>;

/// Object pool for single-threaded or externally synchronized use, backed by
/// a [`Queue`]. Like the queue, the type is `!Sync`.
pub struct Pool<T> {
    queue: Queue<T>,
    factory: Option<Factory<T>>,
    fallback: Option<Factory<T>>,
}

impl<T> Pool<T> {
    /// Creates an empty pool with no factory; `acquire` on an empty pool
    /// fails with `Unavailable` unless a fallback is configured.
    pub fn new() -> Self {
        Self::build(Queue::new(), None)
    }

    pub fn with_segment_size(segment_size: usize) -> Result<Self> {
        Ok(Self::build(Queue::with_segment_size(segment_size)?, None))
    }

    /// Creates a pool that manufactures objects with `factory` when empty.
    pub fn with_factory(factory: impl Fn() -> T + 'static) -> Self {
        Self::build(Queue::new(), Some(Box::new(factory)))
    }

    pub fn with_factory_and_segment_size(
        factory: impl Fn() -> T + 'static,
        segment_size: usize,
    ) -> Result<Self> {
        Ok(Self::build(
            Queue::with_segment_size(segment_size)?,
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

    fn build(queue: Queue<T>, factory: Option<Factory<T>>) -> Self {
        Pool {
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

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ObjectPool<T> for Pool<T> {
    fn len(&self) -> usize {
        Pool::len(self)
    }

    fn is_thread_safe(&self) -> bool {
        false
    }

    fn acquire(&self) -> Result<T> {
        Pool::acquire(self)
    }

    fn try_acquire(&self) -> Option<T> {
        Pool::try_acquire(self)
    }

    fn acquire_with(&self, factory: &dyn Fn() -> T) -> T {
        Pool::acquire_with(self, factory)
    }

    fn release(&self, item: T) {
        Pool::release(self, item)
    }
}
