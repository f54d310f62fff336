use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ringpool::{ConcurrentPool, ConcurrentQueue, ObjectPool, Queue};
use std::sync::Arc;
use std::thread;

const ITEMS: u64 = 10_000;

fn unsync_queue_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_unsync");
    group.throughput(Throughput::Elements(ITEMS));
    for segment_size in [16, 64, 256] {
        group.bench_with_input(
            BenchmarkId::new("enqueue_dequeue", segment_size),
            &segment_size,
            |b, &segment_size| {
                let queue = Queue::with_segment_size(segment_size).unwrap();
                b.iter(|| {
                    for value in 0..ITEMS {
                        queue.enqueue(value);
                    }
                    while queue.try_dequeue().is_some() {}
                });
            },
        );
    }
    group.finish();
}

fn concurrent_queue_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_concurrent");
    group.throughput(Throughput::Elements(ITEMS));

    group.bench_function("single_thread", |b| {
        let queue = ConcurrentQueue::with_segment_size(64).unwrap();
        b.iter(|| {
            for value in 0..ITEMS {
                queue.enqueue(value);
            }
            while queue.try_dequeue().is_some() {}
        });
    });

    for threads in [2, 4] {
        group.bench_with_input(
            BenchmarkId::new("mpmc", threads),
            &threads,
            |b, &threads| {
                b.iter(|| {
                    let queue = Arc::new(ConcurrentQueue::with_segment_size(64).unwrap());
                    let workers: Vec<_> = (0..threads)
                        .map(|_| {
                            let queue = Arc::clone(&queue);
                            thread::spawn(move || {
                                let per_worker = ITEMS / threads as u64;
                                for value in 0..per_worker {
                                    queue.enqueue(value);
                                }
                                let mut taken = 0;
                                while taken < per_worker {
                                    if queue.try_dequeue().is_some() {
                                        taken += 1;
                                    }
                                }
                            })
                        })
                        .collect();
                    for worker in workers {
                        worker.join().unwrap();
                    }
                });
            },
        );
    }
    group.finish();
}

fn pool_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool");
    group.bench_function("acquire_release", |b| {
        let pool = ConcurrentPool::with_factory(|| Vec::<u8>::with_capacity(1024));
        pool.release(pool.acquire().unwrap());
        b.iter(|| {
            let buffer = pool.acquire().unwrap();
            pool.release(buffer);
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    unsync_queue_throughput,
    concurrent_queue_throughput,
    pool_round_trip
);
criterion_main!(benches);
