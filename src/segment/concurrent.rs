//! Lock-free ring segment.

use crossbeam::utils::Backoff;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicPtr, Ordering};

/// Lock-free MPMC ring segment.
///
/// Each slot carries a sequence number: a slot may be written only when its
/// sequence equals the tail cursor, and read only when it equals `head + 1`.
/// Losing a compare-and-swap means another thread claimed the cursor; the
/// operation reloads and retries.
///
/// Freezing shifts the visible tail by `freeze_offset = 2 * capacity`, so
/// new writers observe the segment as exhausted during a hand-off to its
/// successor while writers that already won their CAS can still complete.
/// The segment-wide `sequence` is the epoch the owning queue checks before
/// touching the segment at all.
///
/// The two forward links are owned by the queue; segments are freed only
/// when the queue drops, after draining, so raw link pointers stay valid for
/// the queue's lifetime.
pub struct ConcurrentSegment<T> {
    items: Box<[UnsafeCell<MaybeUninit<T>>]>,
    sequences: Box<[AtomicIsize]>,
    head: AtomicIsize,
    tail: AtomicIsize,
    sequence: AtomicIsize,
    frozen_for_enqueue: AtomicBool,
    freeze_offset: isize,
    next_head: AtomicPtr<ConcurrentSegment<T>>,
    next_tail: AtomicPtr<ConcurrentSegment<T>>,
}

unsafe impl<T: Send> Send for ConcurrentSegment<T> {}
unsafe impl<T: Send> Sync for ConcurrentSegment<T> {}

impl<T> ConcurrentSegment<T> {
    pub fn new(capacity: usize) -> Self {
        Self::with_sequence(capacity, 0)
    }

    /// Creates a segment whose epoch starts at `sequence`. The owning queue
    /// overwrites the epoch when it unfreezes the segment into service.
    pub fn with_sequence(capacity: usize, sequence: isize) -> Self {
        debug_assert!(capacity > 0);
        let items = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let sequences = (0..capacity)
            .map(|index| AtomicIsize::new(index as isize))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        ConcurrentSegment {
            items,
            sequences,
            head: AtomicIsize::new(0),
            tail: AtomicIsize::new(0),
            sequence: AtomicIsize::new(sequence),
            frozen_for_enqueue: AtomicBool::new(false),
            freeze_offset: (capacity * 2) as isize,
            next_head: AtomicPtr::new(ptr::null_mut()),
            next_tail: AtomicPtr::new(ptr::null_mut()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.items.len()
    }

    /// Item count, adjusted for an in-flight freeze. Approximate under
    /// concurrent traffic.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let mut tail = self.tail.load(Ordering::Acquire);
        if self.frozen_for_enqueue.load(Ordering::Acquire) {
            tail -= self.freeze_offset;
        }
        (tail - head).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The segment's epoch: the value of the owning queue's transition
    /// counter when this segment was put into service.
    pub fn sequence(&self) -> isize {
        self.sequence.load(Ordering::Acquire)
    }

    /// Blocks new writers by shifting the visible tail past capacity.
    /// Called only by the winner of the owning queue's transition CAS.
    pub fn freeze_for_enqueue(&self) {
        self.frozen_for_enqueue.store(true, Ordering::Release);
        self.tail.fetch_add(self.freeze_offset, Ordering::SeqCst);
    }

    /// Restores the tail and stamps the epoch of the transition that put
    /// this segment into service.
    pub fn unfreeze_for_enqueue(&self, next_sequence: isize) {
        self.frozen_for_enqueue.store(false, Ordering::Release);
        self.tail.fetch_sub(self.freeze_offset, Ordering::SeqCst);
        self.sequence.store(next_sequence, Ordering::Release);
    }

    /// Claims the tail slot via CAS and publishes the item. Hands the item
    /// back when the segment is exhausted (the caller must transition to the
    /// next segment).
    pub fn try_write(&self, item: T) -> std::result::Result<(), T> {
        let capacity = self.capacity() as isize;
        loop {
            let current_tail = self.tail.load(Ordering::Acquire);
            let index = (current_tail % capacity) as usize;
            let sequence = self.sequences[index].load(Ordering::Acquire);
            let diff = sequence - current_tail;

            if diff == 0 {
                if self
                    .tail
                    .compare_exchange_weak(
                        current_tail,
                        current_tail + 1,
                        Ordering::SeqCst,
                        Ordering::Relaxed,
                    )
                    .is_ok()
                {
                    unsafe { (*self.items[index].get()).write(item) };
                    self.sequences[index].store(current_tail + 1, Ordering::Release);
                    return Ok(());
                }
                // lost the cursor race, reload and retry
            } else if diff < 0 {
                return Err(item);
            }
            // diff > 0: stale tail, reload and retry
        }
    }

    /// Claims the head slot via CAS and takes the item. Returns `None` only
    /// when the segment is provably drained; a slot whose writer is still
    /// mid-flight is spun on.
    pub fn try_read(&self) -> Option<T> {
        let capacity = self.capacity() as isize;
        let backoff = Backoff::new();
        loop {
            let current_head = self.head.load(Ordering::Acquire);
            let index = (current_head % capacity) as usize;
            let sequence = self.sequences[index].load(Ordering::Acquire);
            let diff = sequence - (current_head + 1);

            if diff == 0 {
                if self
                    .head
                    .compare_exchange_weak(
                        current_head,
                        current_head + 1,
                        Ordering::SeqCst,
                        Ordering::Relaxed,
                    )
                    .is_ok()
                {
                    let item = unsafe { (*self.items[index].get()).assume_init_read() };
                    self.sequences[index].store(current_head + capacity, Ordering::Release);
                    return Some(item);
                }
            } else if diff < 0 {
                if self.provably_drained(current_head) {
                    return None;
                }
                // a writer claimed the slot but has not published yet
                backoff.snooze();
            }
        }
    }

    /// Clones the head item without consuming it. The head cursor is shifted
    /// by the freeze offset for the duration of the copy so no concurrent
    /// reader can claim the slot mid-clone.
    pub fn try_peek(&self) -> Option<T>
    where
        T: Clone,
    {
        let capacity = self.capacity() as isize;
        let backoff = Backoff::new();
        loop {
            let current_head = self.head.load(Ordering::Acquire);
            let index = (current_head % capacity) as usize;
            let sequence = self.sequences[index].load(Ordering::Acquire);
            let diff = sequence - (current_head + 1);

            if diff == 0 {
                if self
                    .head
                    .compare_exchange_weak(
                        current_head,
                        current_head + self.freeze_offset,
                        Ordering::SeqCst,
                        Ordering::Relaxed,
                    )
                    .is_ok()
                {
                    let item = unsafe { (*self.items[index].get()).assume_init_ref().clone() };
                    self.head.fetch_sub(self.freeze_offset, Ordering::SeqCst);
                    return Some(item);
                }
            } else if diff < 0 {
                if self.provably_drained(current_head) {
                    return None;
                }
                backoff.snooze();
            }
        }
    }

    fn provably_drained(&self, current_head: isize) -> bool {
        let frozen = self.frozen_for_enqueue.load(Ordering::Acquire);
        let current_tail = self.tail.load(Ordering::Acquire);
        current_tail - current_head <= 0
            || (frozen && current_tail - self.freeze_offset - current_head <= 0)
    }

    pub fn next_head(&self) -> *mut ConcurrentSegment<T> {
        self.next_head.load(Ordering::Acquire)
    }

    pub fn next_tail(&self) -> *mut ConcurrentSegment<T> {
        self.next_tail.load(Ordering::Acquire)
    }

    pub(crate) fn set_next_head(&self, next: *mut ConcurrentSegment<T>) {
        self.next_head.store(next, Ordering::Release);
    }

    pub(crate) fn set_next_tail(&self, next: *mut ConcurrentSegment<T>) {
        self.next_tail.store(next, Ordering::Release);
    }

    pub(crate) fn take_next_head(&self) -> *mut ConcurrentSegment<T> {
        self.next_head.swap(ptr::null_mut(), Ordering::AcqRel)
    }

    pub(crate) fn take_next_tail(&self) -> *mut ConcurrentSegment<T> {
        self.next_tail.swap(ptr::null_mut(), Ordering::AcqRel)
    }
}
