//! Pool and registry end-to-end scenarios.

use ringpool::pool::{
    ConcurrentKeyedPool, ConcurrentPool, KeyedObjectPool, ObjectPool, SharedKeyedPool, SharedPool,
};
use ringpool::registry::{KeyedPoolRegistry, PoolRegistry};
use serial_test::serial;
use std::sync::Arc;
use std::thread;

#[derive(Default)]
struct Scratch {
    data: Vec<u8>,
}

#[test]
fn pooled_buffers_keep_their_capacity() {
    let pool = ConcurrentPool::with_factory(|| Scratch {
        data: Vec::with_capacity(4096),
    });

    let mut scratch = pool.acquire().unwrap();
    let capacity = scratch.data.capacity();
    scratch.data.extend_from_slice(b"payload");
    scratch.data.clear();
    pool.release(scratch);

    let reused = pool.acquire().unwrap();
    assert_eq!(reused.data.capacity(), capacity);
    assert!(reused.data.is_empty());
}

#[test]
fn keyed_pool_partitions_by_size_class() {
    let pool = ConcurrentKeyedPool::with_factory(|size: &usize| vec![0u8; *size]);
    let small = pool.acquire(&64).unwrap();
    let large = pool.acquire(&4096).unwrap();
    assert_eq!(small.len(), 64);
    assert_eq!(large.len(), 4096);

    pool.release(64, small);
    pool.release(4096, large);
    assert_eq!(pool.count(&64), 1);
    assert_eq!(pool.count(&4096), 1);
    assert_eq!(pool.acquire(&64).unwrap().len(), 64);
}

#[test]
#[serial]
fn global_registry_shares_one_pool_across_threads() {
    PoolRegistry::global().clear();

    let workers: Vec<_> = (0..4)
        .map(|_| {
            thread::spawn(|| {
                let pool = PoolRegistry::global()
                    .get_or_add::<Scratch>(|| Arc::new(ConcurrentPool::<Scratch>::new().with_default_fallback()));
                for _ in 0..100 {
                    let scratch = pool.acquire().unwrap();
                    pool.release(scratch);
                }
                Arc::as_ptr(&pool) as *const () as usize
            })
        })
        .collect();

    let addresses: Vec<usize> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    // every thread resolved the same pool
    assert!(addresses.windows(2).all(|pair| pair[0] == pair[1]));

    PoolRegistry::global().clear();
    assert!(!PoolRegistry::global().any::<Scratch>());
}

#[test]
#[serial]
fn keyed_registry_round_trip() {
    KeyedPoolRegistry::global().clear();

    let pool: Arc<dyn SharedKeyedPool<String, Vec<u8>>> =
        Arc::new(ConcurrentKeyedPool::with_factory(|key: &String| {
            Vec::with_capacity(key.len())
        }));
    KeyedPoolRegistry::global().add(Arc::clone(&pool)).unwrap();

    let found = KeyedPoolRegistry::global()
        .try_get::<String, Vec<u8>>()
        .unwrap();
    let buffer = found.acquire(&"connection".to_string()).unwrap();
    found.release("connection".to_string(), buffer);
    assert_eq!(found.count(&"connection".to_string()), 1);

    assert!(KeyedPoolRegistry::global().remove(&pool));
    KeyedPoolRegistry::global().clear();
}

#[test]
fn registry_selects_by_capability() {
    let registry = PoolRegistry::new();
    let plain: Arc<dyn SharedPool<u32>> = Arc::new(ConcurrentPool::new());
    let stocked: Arc<dyn SharedPool<u32>> = Arc::new(ConcurrentPool::new());
    stocked.release(1);
    stocked.release(2);
    registry.try_add(Arc::clone(&plain));
    registry.try_add(Arc::clone(&stocked));

    let found = registry
        .try_get_with::<u32>(|pool| pool.len() >= 2)
        .unwrap();
    assert_eq!(found.acquire(), Ok(1));

    assert_eq!(registry.remove_all_matching::<u32>(|pool| pool.is_empty()), 1);
    assert!(registry.contains(&stocked));
}
