//! Registry of keyed pools, keyed by the key/element type pair.

use crate::pool::SharedKeyedPool;
use crate::registry::same_data;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

type Bucket<K, T> = Vec<Arc<dyn SharedKeyedPool<K, T>>>;

static GLOBAL: LazyLock<KeyedPoolRegistry> = LazyLock::new(KeyedPoolRegistry::new);

fn shape<K: 'static, T: 'static>() -> (TypeId, TypeId) {
    (TypeId::of::<K>(), TypeId::of::<T>())
}

/// Directory of [`SharedKeyedPool`]s by key/element type pair. The same
/// membership and locking rules as [`PoolRegistry`] apply.
///
/// [`PoolRegistry`]: crate::registry::PoolRegistry
pub struct KeyedPoolRegistry {
    buckets: RwLock<HashMap<(TypeId, TypeId), Box<dyn Any + Send + Sync>>>,
}

impl KeyedPoolRegistry {
    pub fn new() -> Self {
        KeyedPoolRegistry {
            buckets: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static KeyedPoolRegistry {
        &GLOBAL
    }

    /// Registers `pool`, failing when the same pool is already present.
    pub fn add<K: 'static, T: 'static>(
        &self,
        pool: Arc<dyn SharedKeyedPool<K, T>>,
    ) -> crate::error::Result<()> {
        if !self.try_add(pool) {
            return Err(crate::error::Error::InvalidArgument(
                "pool is already registered".into(),
            ));
        }
        Ok(())
    }

    /// Registers `pool` unless the same pool is already present.
    pub fn try_add<K: 'static, T: 'static>(&self, pool: Arc<dyn SharedKeyedPool<K, T>>) -> bool {
        let mut map = self.buckets.write();
        let bucket = bucket_mut::<K, T>(&mut map);
        if bucket.iter().any(|existing| same_data(existing, &pool)) {
            return false;
        }
        tracing::debug!(
            key = std::any::type_name::<K>(),
            element = std::any::type_name::<T>(),
            "registering keyed pool"
        );
        bucket.push(pool);
        true
    }

    /// Deregisters `pool`. Returns `false` when it was not present.
    pub fn remove<K: 'static, T: 'static>(&self, pool: &Arc<dyn SharedKeyedPool<K, T>>) -> bool {
        let mut map = self.buckets.write();
        let Some(bucket) = try_bucket_mut::<K, T>(&mut map) else {
            return false;
        };
        let before = bucket.len();
        bucket.retain(|existing| !same_data(existing, pool));
        let removed = bucket.len() < before;
        if bucket.is_empty() {
            map.remove(&shape::<K, T>());
        }
        removed
    }

    /// Deregisters every pool of this shape. Returns how many were removed.
    pub fn remove_all<K: 'static, T: 'static>(&self) -> usize {
        self.remove_all_matching::<K, T>(|_| true)
    }

    /// Deregisters every pool of this shape the predicate selects.
    pub fn remove_all_matching<K: 'static, T: 'static>(
        &self,
        predicate: impl Fn(&dyn SharedKeyedPool<K, T>) -> bool,
    ) -> usize {
        let mut map = self.buckets.write();
        let Some(bucket) = try_bucket_mut::<K, T>(&mut map) else {
            return 0;
        };
        let before = bucket.len();
        bucket.retain(|pool| !predicate(pool.as_ref()));
        let removed = before - bucket.len();
        if bucket.is_empty() {
            map.remove(&shape::<K, T>());
        }
        removed
    }

    pub fn contains<K: 'static, T: 'static>(&self, pool: &Arc<dyn SharedKeyedPool<K, T>>) -> bool {
        let map = self.buckets.read();
        try_bucket::<K, T>(&map)
            .is_some_and(|bucket| bucket.iter().any(|existing| same_data(existing, pool)))
    }

    /// Whether any pool of this shape is registered.
    pub fn any<K: 'static, T: 'static>(&self) -> bool {
        let map = self.buckets.read();
        try_bucket::<K, T>(&map).is_some_and(|bucket| !bucket.is_empty())
    }

    pub fn any_matching<K: 'static, T: 'static>(
        &self,
        predicate: impl Fn(&dyn SharedKeyedPool<K, T>) -> bool,
    ) -> bool {
        let map = self.buckets.read();
        try_bucket::<K, T>(&map)
            .is_some_and(|bucket| bucket.iter().any(|pool| predicate(pool.as_ref())))
    }

    /// First registered pool of this shape, if any.
    pub fn try_get<K: 'static, T: 'static>(&self) -> Option<Arc<dyn SharedKeyedPool<K, T>>> {
        self.try_get_with::<K, T>(|_| true)
    }

    /// First registered pool of this shape the selector accepts.
    pub fn try_get_with<K: 'static, T: 'static>(
        &self,
        selector: impl Fn(&dyn SharedKeyedPool<K, T>) -> bool,
    ) -> Option<Arc<dyn SharedKeyedPool<K, T>>> {
        let map = self.buckets.read();
        try_bucket::<K, T>(&map)?
            .iter()
            .find(|pool| selector(pool.as_ref()))
            .cloned()
    }

    /// Returns the first registered pool of this shape, registering the pool
    /// `on_missing` builds when none exists.
    pub fn get_or_add<K: 'static, T: 'static>(
        &self,
        on_missing: impl FnOnce() -> Arc<dyn SharedKeyedPool<K, T>>,
    ) -> Arc<dyn SharedKeyedPool<K, T>> {
        self.get_or_add_with(|_| true, on_missing)
    }

    /// Like [`get_or_add`](Self::get_or_add) with a selector; the lookup is
    /// repeated under the write lock so a racing registration is found
    /// instead of duplicated.
    pub fn get_or_add_with<K: 'static, T: 'static>(
        &self,
        selector: impl Fn(&dyn SharedKeyedPool<K, T>) -> bool,
        on_missing: impl FnOnce() -> Arc<dyn SharedKeyedPool<K, T>>,
    ) -> Arc<dyn SharedKeyedPool<K, T>> {
        if let Some(pool) = self.try_get_with::<K, T>(&selector) {
            return pool;
        }
        let mut map = self.buckets.write();
        let bucket = bucket_mut::<K, T>(&mut map);
        if let Some(pool) = bucket.iter().find(|pool| selector(pool.as_ref())) {
            return Arc::clone(pool);
        }
        tracing::debug!(
            key = std::any::type_name::<K>(),
            element = std::any::type_name::<T>(),
            "registering keyed pool"
        );
        let pool = on_missing();
        bucket.push(Arc::clone(&pool));
        pool
    }

    /// Empties the registry. Intended for test teardown.
    pub fn clear(&self) {
        tracing::debug!("clearing keyed pool registry");
        self.buckets.write().clear();
    }
}

impl Default for KeyedPoolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn try_bucket<K: 'static, T: 'static>(
    map: &HashMap<(TypeId, TypeId), Box<dyn Any + Send + Sync>>,
) -> Option<&Bucket<K, T>> {
    map.get(&shape::<K, T>())
        .and_then(|erased| erased.downcast_ref::<Bucket<K, T>>())
}

fn try_bucket_mut<K: 'static, T: 'static>(
    map: &mut HashMap<(TypeId, TypeId), Box<dyn Any + Send + Sync>>,
) -> Option<&mut Bucket<K, T>> {
    map.get_mut(&shape::<K, T>())
        .and_then(|erased| erased.downcast_mut::<Bucket<K, T>>())
}

fn bucket_mut<K: 'static, T: 'static>(
    map: &mut HashMap<(TypeId, TypeId), Box<dyn Any + Send + Sync>>,
) -> &mut Bucket<K, T> {
    let erased = map
        .entry(shape::<K, T>())
        .or_insert_with(|| Box::new(Bucket::<K, T>::new()));
    match erased.downcast_mut::<Bucket<K, T>>() {
        Some(bucket) => bucket,
        None => unreachable!("bucket payload diverged from its TypeId key"),
    }
}
