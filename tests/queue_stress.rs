//! Concurrent queue stress scenarios.

use rand::Rng;
use ringpool::{ConcurrentQueue, Error, Fifo};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

const WORKERS: usize = 5;
const CYCLES: usize = 100_000;

#[test]
fn enqueue_dequeue_cycles_conserve_count() {
    let queue = Arc::new(ConcurrentQueue::new());
    let workers: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for cycle in 0..CYCLES {
                    queue.enqueue(worker * CYCLES + cycle);
                    // every worker takes back exactly one item per cycle,
                    // though not necessarily its own
                    loop {
                        if queue.try_dequeue().is_some() {
                            break;
                        }
                        std::hint::spin_loop();
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(queue.len(), 0);
    assert_eq!(queue.try_dequeue(), None);
}

#[test]
fn producers_and_consumers_transfer_every_item() {
    const PER_PRODUCER: u64 = 50_000;
    let queue = Arc::new(ConcurrentQueue::with_segment_size(16).unwrap());
    let consumed = Arc::new(AtomicU64::new(0));

    let producers: Vec<_> = (0..3u64)
        .map(|worker| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for value in 0..PER_PRODUCER {
                    queue.enqueue(worker * PER_PRODUCER + value);
                }
            })
        })
        .collect();

    let consumers: Vec<_> = (0..3)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let consumed = Arc::clone(&consumed);
            thread::spawn(move || {
                let mut sum = 0u64;
                while consumed.load(Ordering::SeqCst) < 3 * PER_PRODUCER {
                    if let Some(value) = queue.try_dequeue() {
                        consumed.fetch_add(1, Ordering::SeqCst);
                        sum += value;
                    } else {
                        thread::yield_now();
                    }
                }
                sum
            })
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }
    let total: u64 = consumers.into_iter().map(|c| c.join().unwrap()).sum();

    let expected: u64 = (0..3 * PER_PRODUCER).sum();
    assert_eq!(total, expected);
    assert_eq!(queue.len(), 0);
}

#[test]
fn tiny_segments_survive_contention() {
    // segment size 1 maximizes hand-off transitions
    let queue = Arc::new(ConcurrentQueue::with_segment_size(1).unwrap());
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut rng = rand::rng();
                let mut balance = 0i64;
                for _ in 0..10_000 {
                    if rng.random_bool(0.5) {
                        queue.enqueue(1u8);
                        balance += 1;
                    } else if queue.try_dequeue().is_some() {
                        balance -= 1;
                    }
                }
                balance
            })
        })
        .collect();

    let balance: i64 = workers.into_iter().map(|w| w.join().unwrap()).sum();
    assert_eq!(queue.len() as i64, balance);
    for _ in 0..balance {
        assert!(queue.try_dequeue().is_some());
    }
    assert_eq!(queue.dequeue(), Err(Error::Underflow));
}

#[test]
fn fifo_holds_per_producer_under_contention() {
    let queue = Arc::new(ConcurrentQueue::with_segment_size(8).unwrap());
    let done = Arc::new(AtomicU64::new(0));

    let producers: Vec<_> = (0..3u64)
        .map(|worker| {
            let queue = Arc::clone(&queue);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                for value in 0..20_000u64 {
                    queue.enqueue((worker, value));
                }
                done.fetch_add(1, Ordering::Release);
            })
        })
        .collect();

    // a single consumer checks that each producer's values arrive in order
    let consumer = {
        let queue = Arc::clone(&queue);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut next = [0u64; 3];
            loop {
                match queue.try_dequeue() {
                    Some((worker, value)) => {
                        assert_eq!(value, next[worker as usize]);
                        next[worker as usize] = value + 1;
                    }
                    None if done.load(Ordering::Acquire) == 3 && queue.is_empty() => break,
                    None => thread::yield_now(),
                }
            }
            next
        })
    };

    for producer in producers {
        producer.join().unwrap();
    }
    assert_eq!(consumer.join().unwrap(), [20_000; 3]);
}
