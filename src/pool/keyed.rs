//! Keyed pools: one bucket of reusable objects per key.

use crate::error::{Error, Result};
use crate::pool::KeyedObjectPool;
use crate::queue::{ConcurrentQueue, Queue};
use dashmap::DashMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;

type KeyedFactory<K, T> = Box<dyn Fn(&K) -> T>;
type SharedKeyedFactory<K, T> = Box<dyn Fn(&K) -> T + Send + Sync>;

fn check_segment_size(segment_size: usize) -> Result<usize> {
    if segment_size == 0 {
        return Err(Error::InvalidArgument(
            "segment size must be at least 1".into(),
        ));
    }
    Ok(segment_size)
}

/// Keyed pool for single-threaded or externally synchronized use. Buckets
/// are created lazily on first release or factory-less probe of a key; an
/// optional pool-level segment size is applied to every bucket.
pub struct KeyedPool<K, T> {
    buckets: RefCell<HashMap<K, Queue<T>>>,
    factory: Option<KeyedFactory<K, T>>,
    fallback: Option<KeyedFactory<K, T>>,
    segment_size: Option<usize>,
}

impl<K, T> KeyedPool<K, T>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::build(None, None)
    }

    pub fn with_segment_size(segment_size: usize) -> Result<Self> {
        Ok(Self::build(None, Some(check_segment_size(segment_size)?)))
    }

    /// Creates a pool that manufactures objects with `factory` when a key's
    /// bucket is empty.
    pub fn with_factory(factory: impl Fn(&K) -> T + 'static) -> Self {
        Self::build(Some(Box::new(factory)), None)
    }

    pub fn with_factory_and_segment_size(
        factory: impl Fn(&K) -> T + 'static,
        segment_size: usize,
    ) -> Result<Self> {
        Ok(Self::build(
            Some(Box::new(factory)),
            Some(check_segment_size(segment_size)?),
        ))
    }

    /// Falls back to `T::default()` when a bucket is empty and no factory
    /// (or per-call override) applies.
    pub fn with_default_fallback(mut self) -> Self
    where
        T: Default + 'static,
    {
        self.fallback = Some(Box::new(|_| T::default()));
        self
    }

    fn build(factory: Option<KeyedFactory<K, T>>, segment_size: Option<usize>) -> Self {
        KeyedPool {
            buckets: RefCell::new(HashMap::new()),
            factory,
            fallback: None,
            segment_size,
        }
    }

    fn make_bucket(&self) -> Queue<T> {
        match self.segment_size {
            Some(size) => Queue::build(size),
            None => Queue::new(),
        }
    }

    /// Number of pooled objects under `key`.
    pub fn count(&self, key: &K) -> usize {
        self.buckets
            .borrow()
            .get(key)
            .map_or(0, |bucket| bucket.len())
    }

    pub fn acquire(&self, key: &K) -> Result<T> {
        self.try_acquire(key).ok_or(Error::Unavailable)
    }

    /// Pooled object for `key`, else configured factory, else fallback,
    /// else `None`.
    pub fn try_acquire(&self, key: &K) -> Option<T> {
        self.take_pooled(key)
            .or_else(|| self.factory.as_ref().map(|make| make(key)))
            .or_else(|| self.fallback.as_ref().map(|make| make(key)))
    }

    pub fn acquire_with(&self, key: &K, factory: &dyn Fn(&K) -> T) -> T {
        self.take_pooled(key).unwrap_or_else(|| factory(key))
    }

    pub fn release(&self, key: K, item: T) {
        self.buckets
            .borrow_mut()
            .entry(key)
            .or_insert_with(|| self.make_bucket())
            .enqueue(item);
    }

    fn take_pooled(&self, key: &K) -> Option<T> {
        self.buckets
            .borrow()
            .get(key)
            .and_then(|bucket| bucket.try_dequeue())
    }
}

impl<K: Eq + Hash, T> Default for KeyedPool<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, T> KeyedObjectPool<K, T> for KeyedPool<K, T> {
    fn count(&self, key: &K) -> usize {
        KeyedPool::count(self, key)
    }

    fn is_thread_safe(&self) -> bool {
        false
    }

    fn acquire(&self, key: &K) -> Result<T> {
        KeyedPool::acquire(self, key)
    }

    fn try_acquire(&self, key: &K) -> Option<T> {
        KeyedPool::try_acquire(self, key)
    }

    fn acquire_with(&self, key: &K, factory: &dyn Fn(&K) -> T) -> T {
        KeyedPool::acquire_with(self, key, factory)
    }

    fn release(&self, key: K, item: T) {
        KeyedPool::release(self, key, item)
    }
}

/// Thread-safe keyed pool. Buckets live in a [`DashMap`], so first use on
/// distinct keys never contends and get-or-create on the same key is atomic.
pub struct ConcurrentKeyedPool<K, T> {
    buckets: DashMap<K, ConcurrentQueue<T>>,
    factory: Option<SharedKeyedFactory<K, T>>,
    fallback: Option<SharedKeyedFactory<K, T>>,
    segment_size: Option<usize>,
}

impl<K, T> ConcurrentKeyedPool<K, T>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::build(None, None)
    }

    pub fn with_segment_size(segment_size: usize) -> Result<Self> {
        Ok(Self::build(None, Some(check_segment_size(segment_size)?)))
    }

    /// Creates a pool that manufactures objects with `factory` when a key's
    /// bucket is empty.
    pub fn with_factory(factory: impl Fn(&K) -> T + Send + Sync + 'static) -> Self {
        Self::build(Some(Box::new(factory)), None)
    }

    pub fn with_factory_and_segment_size(
        factory: impl Fn(&K) -> T + Send + Sync + 'static,
        segment_size: usize,
    ) -> Result<Self> {
        Ok(Self::build(
            Some(Box::new(factory)),
            Some(check_segment_size(segment_size)?),
        ))
    }

    /// Falls back to `T::default()` when a bucket is empty and no factory
    /// (or per-call override) applies.
    pub fn with_default_fallback(mut self) -> Self
    where
        T: Default + 'static,
    {
        self.fallback = Some(Box::new(|_| T::default()));
        self
    }

    fn build(factory: Option<SharedKeyedFactory<K, T>>, segment_size: Option<usize>) -> Self {
        ConcurrentKeyedPool {
            buckets: DashMap::new(),
            factory,
            fallback: None,
            segment_size,
        }
    }

    fn make_bucket(&self) -> ConcurrentQueue<T> {
        match self.segment_size {
            Some(size) => ConcurrentQueue::build(size),
            None => ConcurrentQueue::new(),
        }
    }

    /// Number of pooled objects under `key`; approximate under concurrent
    /// traffic.
    pub fn count(&self, key: &K) -> usize {
        self.buckets.get(key).map_or(0, |bucket| bucket.len())
    }

    pub fn acquire(&self, key: &K) -> Result<T> {
        self.try_acquire(key).ok_or(Error::Unavailable)
    }

    /// Pooled object for `key`, else configured factory, else fallback,
    /// else `None`.
    pub fn try_acquire(&self, key: &K) -> Option<T> {
        self.take_pooled(key)
            .or_else(|| self.factory.as_ref().map(|make| make(key)))
            .or_else(|| self.fallback.as_ref().map(|make| make(key)))
    }

    pub fn acquire_with(&self, key: &K, factory: &dyn Fn(&K) -> T) -> T {
        self.take_pooled(key).unwrap_or_else(|| factory(key))
    }

    pub fn release(&self, key: K, item: T) {
        self.buckets
            .entry(key)
            .or_insert_with(|| self.make_bucket())
            .enqueue(item);
    }

    fn take_pooled(&self, key: &K) -> Option<T> {
        self.buckets.get(key).and_then(|bucket| bucket.try_dequeue())
    }
}

impl<K: Eq + Hash, T> Default for ConcurrentKeyedPool<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, T> KeyedObjectPool<K, T> for ConcurrentKeyedPool<K, T> {
    fn count(&self, key: &K) -> usize {
        ConcurrentKeyedPool::count(self, key)
    }

    fn is_thread_safe(&self) -> bool {
        true
    }

    fn acquire(&self, key: &K) -> Result<T> {
        ConcurrentKeyedPool::acquire(self, key)
    }

    fn try_acquire(&self, key: &K) -> Option<T> {
        ConcurrentKeyedPool::try_acquire(self, key)
    }

    fn acquire_with(&self, key: &K, factory: &dyn Fn(&K) -> T) -> T {
        ConcurrentKeyedPool::acquire_with(self, key, factory)
    }

    fn release(&self, key: K, item: T) {
        ConcurrentKeyedPool::release(self, key, item)
    }
}
