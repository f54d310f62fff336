//! Registry of flat pools, keyed by element type.

use crate::pool::SharedPool;
use crate::registry::same_data;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

type Bucket<T> = Vec<Arc<dyn SharedPool<T>>>;

static GLOBAL: LazyLock<PoolRegistry> = LazyLock::new(PoolRegistry::new);

/// Directory of [`SharedPool`]s by element type.
///
/// Each element type gets one bucket holding every registered pool of that
/// type; membership is by pool identity (data pointer). The erased buckets
/// are `Box<dyn Any>` downcast back through the same `TypeId` they are keyed
/// by, so the downcasts cannot fail.
pub struct PoolRegistry {
    buckets: RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        PoolRegistry {
            buckets: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static PoolRegistry {
        &GLOBAL
    }

    /// Registers `pool`, failing when the same pool is already present.
    pub fn add<T: 'static>(&self, pool: Arc<dyn SharedPool<T>>) -> crate::error::Result<()> {
        if !self.try_add(pool) {
            return Err(crate::error::Error::InvalidArgument(
                "pool is already registered".into(),
            ));
        }
        Ok(())
    }

    /// Registers `pool` unless the same pool is already present.
    pub fn try_add<T: 'static>(&self, pool: Arc<dyn SharedPool<T>>) -> bool {
        let mut map = self.buckets.write();
        let bucket = bucket_mut::<T>(&mut map);
        if bucket.iter().any(|existing| same_data(existing, &pool)) {
            return false;
        }
        tracing::debug!(element = std::any::type_name::<T>(), "registering pool");
        bucket.push(pool);
        true
    }

    /// Deregisters `pool`. Returns `false` when it was not present.
    pub fn remove<T: 'static>(&self, pool: &Arc<dyn SharedPool<T>>) -> bool {
        let mut map = self.buckets.write();
        let Some(bucket) = try_bucket_mut::<T>(&mut map) else {
            return false;
        };
        let before = bucket.len();
        bucket.retain(|existing| !same_data(existing, pool));
        let removed = bucket.len() < before;
        if bucket.is_empty() {
            map.remove(&TypeId::of::<T>());
        }
        if removed {
            tracing::debug!(element = std::any::type_name::<T>(), "deregistering pool");
        }
        removed
    }

    /// Deregisters every pool of element type `T`. Returns how many were
    /// removed.
    pub fn remove_all<T: 'static>(&self) -> usize {
        self.remove_all_matching::<T>(|_| true)
    }

    /// Deregisters every pool of element type `T` the predicate selects.
    pub fn remove_all_matching<T: 'static>(
        &self,
        predicate: impl Fn(&dyn SharedPool<T>) -> bool,
    ) -> usize {
        let mut map = self.buckets.write();
        let Some(bucket) = try_bucket_mut::<T>(&mut map) else {
            return 0;
        };
        let before = bucket.len();
        bucket.retain(|pool| !predicate(pool.as_ref()));
        let removed = before - bucket.len();
        if bucket.is_empty() {
            map.remove(&TypeId::of::<T>());
        }
        if removed > 0 {
            tracing::debug!(
                element = std::any::type_name::<T>(),
                removed,
                "deregistering pools"
            );
        }
        removed
    }

    pub fn contains<T: 'static>(&self, pool: &Arc<dyn SharedPool<T>>) -> bool {
        let map = self.buckets.read();
        try_bucket::<T>(&map)
            .is_some_and(|bucket| bucket.iter().any(|existing| same_data(existing, pool)))
    }

    /// Whether any pool of element type `T` is registered.
    pub fn any<T: 'static>(&self) -> bool {
        let map = self.buckets.read();
        try_bucket::<T>(&map).is_some_and(|bucket| !bucket.is_empty())
    }

    pub fn any_matching<T: 'static>(&self, predicate: impl Fn(&dyn SharedPool<T>) -> bool) -> bool {
        let map = self.buckets.read();
        try_bucket::<T>(&map)
            .is_some_and(|bucket| bucket.iter().any(|pool| predicate(pool.as_ref())))
    }

    /// First registered pool of element type `T`, if any.
    pub fn try_get<T: 'static>(&self) -> Option<Arc<dyn SharedPool<T>>> {
        self.try_get_with::<T>(|_| true)
    }

    /// First registered pool of element type `T` the selector accepts.
    pub fn try_get_with<T: 'static>(
        &self,
        selector: impl Fn(&dyn SharedPool<T>) -> bool,
    ) -> Option<Arc<dyn SharedPool<T>>> {
        let map = self.buckets.read();
        try_bucket::<T>(&map)?
            .iter()
            .find(|pool| selector(pool.as_ref()))
            .cloned()
    }

    /// Returns the first registered pool of element type `T`, registering
    /// the pool `on_missing` builds when none exists.
    pub fn get_or_add<T: 'static>(
        &self,
        on_missing: impl FnOnce() -> Arc<dyn SharedPool<T>>,
    ) -> Arc<dyn SharedPool<T>> {
        self.get_or_add_with(|_| true, on_missing)
    }

    /// Like [`get_or_add`](Self::get_or_add) with a selector. The optimistic
    /// read-lock probe is fully released before the write lock is taken, and
    /// the lookup repeats under the write lock, so a racing registration is
    /// found instead of duplicated.
    pub fn get_or_add_with<T: 'static>(
        &self,
        selector: impl Fn(&dyn SharedPool<T>) -> bool,
        on_missing: impl FnOnce() -> Arc<dyn SharedPool<T>>,
    ) -> Arc<dyn SharedPool<T>> {
        if let Some(pool) = self.try_get_with::<T>(&selector) {
            return pool;
        }
        let mut map = self.buckets.write();
        let bucket = bucket_mut::<T>(&mut map);
        if let Some(pool) = bucket.iter().find(|pool| selector(pool.as_ref())) {
            return Arc::clone(pool);
        }
        tracing::debug!(element = std::any::type_name::<T>(), "registering pool");
        let pool = on_missing();
        bucket.push(Arc::clone(&pool));
        pool
    }

    /// Empties the registry. Intended for test teardown.
    pub fn clear(&self) {
        tracing::debug!("clearing pool registry");
        self.buckets.write().clear();
    }
}

impl Default for PoolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn try_bucket<T: 'static>(map: &HashMap<TypeId, Box<dyn Any + Send + Sync>>) -> Option<&Bucket<T>> {
    map.get(&TypeId::of::<T>())
        .and_then(|erased| erased.downcast_ref::<Bucket<T>>())
}

fn try_bucket_mut<T: 'static>(
    map: &mut HashMap<TypeId, Box<dyn Any + Send + Sync>>,
) -> Option<&mut Bucket<T>> {
    map.get_mut(&TypeId::of::<T>())
        .and_then(|erased| erased.downcast_mut::<Bucket<T>>())
}

fn bucket_mut<T: 'static>(
    map: &mut HashMap<TypeId, Box<dyn Any + Send + Sync>>,
) -> &mut Bucket<T> {
    let erased = map
        .entry(TypeId::of::<T>())
        .or_insert_with(|| Box::new(Bucket::<T>::new()));
    match erased.downcast_mut::<Bucket<T>>() {
        Some(bucket) => bucket,
        None => unreachable!("bucket payload diverged from its TypeId key"),
    }
}
