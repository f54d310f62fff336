//! Lock-free queue.

use crate::chain::ConcurrentSegmentChain;
use crate::defaults;
use crate::error::{Error, Result};
use crate::queue::Fifo;
use crate::segment::ConcurrentSegment;
use crossbeam::utils::Backoff;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};

/// Unbounded lock-free MPMC FIFO.
///
/// The global `head` and `tail` counters count segment transitions, not
/// items; each segment's epoch is the transition that put it into service,
/// and an operation only touches a segment whose epoch matches the loaded
/// counter. Segment hand-off is arbitrated by a CAS on the transition
/// counter: the winner freezes the exhausted segment, lazily creates (or
/// reuses a linked) successor, publishes it to both chains, and unfreezes it
/// with the new epoch. Everyone else spins with bounded backoff until the
/// new epoch is visible.
///
/// Drained segments rejoin the enqueue chain at its tail (unlike the
/// single-threaded queue, which recycles to the head): a reader may still be
/// spinning on a just-drained segment, so it must stay clear of the active
/// enqueue cursor until the enqueue side reaches it through the link chain.
///
/// An empty queue never blocks: once the boundary check proves no data is
/// in flight, `try_dequeue` returns `None`.
pub struct ConcurrentQueue<T> {
    enqueues: ConcurrentSegmentChain<T>,
    dequeues: ConcurrentSegmentChain<T>,
    head: AtomicIsize,
    tail: AtomicIsize,
    count: AtomicUsize,
    segment_size: usize,
    _owns: PhantomData<Box<ConcurrentSegment<T>>>,
}

unsafe impl<T: Send> Send for ConcurrentQueue<T> {}
unsafe impl<T: Send> Sync for ConcurrentQueue<T> {}

impl<T> ConcurrentQueue<T> {
    /// Creates a queue using the process-wide default segment size.
    pub fn new() -> Self {
        Self::build(defaults::segment_size())
    }

    /// Creates a queue with fixed-size segments of `segment_size` slots.
    pub fn with_segment_size(segment_size: usize) -> Result<Self> {
        if segment_size == 0 {
            return Err(Error::InvalidArgument(
                "segment size must be at least 1".into(),
            ));
        }
        Ok(Self::build(segment_size))
    }

    pub(crate) fn build(segment_size: usize) -> Self {
        let root = Box::into_raw(Box::new(ConcurrentSegment::new(segment_size)));
        ConcurrentQueue {
            // SAFETY: the queue owns `root` and frees it on drop
            enqueues: unsafe { ConcurrentSegmentChain::new(root) },
            dequeues: unsafe { ConcurrentSegmentChain::new(root) },
            head: AtomicIsize::new(0),
            tail: AtomicIsize::new(0),
            count: AtomicUsize::new(0),
            segment_size,
            _owns: PhantomData,
        }
    }

    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    /// Item count; approximate while operations are in flight.
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn enqueue(&self, item: T) {
        let backoff = Backoff::new();
        let mut item = item;
        loop {
            let segment_ptr = self.enqueues.head();
            // SAFETY: chain heads point at segments owned by this queue
            let segment = unsafe { &*segment_ptr };
            let current_tail = self.tail.load(Ordering::Acquire);
            let diff = segment.sequence() - current_tail;

            if diff == 0 {
                match segment.try_write(item) {
                    Ok(()) => {
                        self.count.fetch_add(1, Ordering::Relaxed);
                        return;
                    }
                    Err(returned) => {
                        item = returned;
                        self.move_to_next_enqueue(&backoff, segment, current_tail);
                    }
                }
            } else if diff < 0 {
                // a transition is mid-flight; wait for the new epoch
                backoff.snooze();
            }
        }
    }

    pub fn dequeue(&self) -> Result<T> {
        self.try_dequeue().ok_or(Error::Underflow)
    }

    pub fn try_dequeue(&self) -> Option<T> {
        let backoff = Backoff::new();
        loop {
            let segment_ptr = self.dequeues.head();
            // SAFETY: chain heads point at segments owned by this queue
            let segment = unsafe { &*segment_ptr };
            let current_head = self.head.load(Ordering::Acquire);
            let diff = segment.sequence() - current_head;

            if diff == 0 {
                match segment.try_read() {
                    Some(item) => {
                        self.count.fetch_sub(1, Ordering::Relaxed);
                        return Some(item);
                    }
                    None => {
                        if !self.try_move_to_next_dequeue(&backoff, segment_ptr, current_head) {
                            return None;
                        }
                    }
                }
            } else if diff < 0 {
                backoff.snooze();
            }
        }
    }

    pub fn peek(&self) -> Result<T>
    where
        T: Clone,
    {
        self.try_peek().ok_or(Error::Underflow)
    }

    pub fn try_peek(&self) -> Option<T>
    where
        T: Clone,
    {
        let backoff = Backoff::new();
        loop {
            let segment_ptr = self.dequeues.head();
            // SAFETY: chain heads point at segments owned by this queue
            let segment = unsafe { &*segment_ptr };
            let current_head = self.head.load(Ordering::Acquire);
            let diff = segment.sequence() - current_head;

            if diff == 0 {
                match segment.try_peek() {
                    Some(item) => return Some(item),
                    None => {
                        if !self.try_move_to_next_dequeue(&backoff, segment_ptr, current_head) {
                            return None;
                        }
                    }
                }
            } else if diff < 0 {
                backoff.snooze();
            }
        }
    }

    /// Hands the write side over to the next segment. Only the winner of the
    /// transition CAS mutates the chains; losers back off and retry.
    fn move_to_next_enqueue(
        &self,
        backoff: &Backoff,
        segment: &ConcurrentSegment<T>,
        current_tail: isize,
    ) {
        let next_sequence = current_tail + 1;
        if self
            .tail
            .compare_exchange(
                current_tail,
                next_sequence,
                Ordering::SeqCst,
                Ordering::Relaxed,
            )
            .is_ok()
        {
            segment.freeze_for_enqueue();

            if segment.next_tail().is_null() {
                tracing::trace!(size = self.segment_size, "allocating concurrent queue segment");
                let fresh = Box::into_raw(Box::new(ConcurrentSegment::with_sequence(
                    self.segment_size,
                    current_tail,
                )));
                // fresh segments enter the chain frozen so no writer can
                // touch them before the epoch is stamped
                unsafe {
                    (*fresh).freeze_for_enqueue();
                    self.enqueues.add_to_tail(fresh);
                }
            }

            let next = segment.next_tail();
            // SAFETY: this thread won the transition CAS; `next` was linked
            // above or recycled by the dequeue side and stays live
            unsafe {
                self.enqueues.move_to_next_tail();
                self.dequeues.add_to_head(next);
                (*next).unfreeze_for_enqueue(next_sequence);
            }
        } else {
            backoff.snooze();
        }
    }

    /// Hands the read side over to the next segment. Returns `false` when
    /// the queue is provably empty (no successor exists).
    fn try_move_to_next_dequeue(
        &self,
        backoff: &Backoff,
        segment_ptr: *mut ConcurrentSegment<T>,
        current_head: isize,
    ) -> bool {
        let next_sequence = current_head + 1;
        if self
            .head
            .compare_exchange(
                current_head,
                next_sequence,
                Ordering::SeqCst,
                Ordering::Relaxed,
            )
            .is_ok()
        {
            // SAFETY: segments stay live for the queue's lifetime
            let segment = unsafe { &*segment_ptr };
            if segment.next_head().is_null() {
                // no successor: roll the transition back and report empty
                self.head.fetch_sub(1, Ordering::SeqCst);
                return false;
            }
            // SAFETY: this thread won the transition CAS
            unsafe {
                self.dequeues.move_to_next_head();
                // drained segments rejoin the enqueue chain at its tail; a
                // spinning reader may still hold a reference to this one
                self.enqueues.add_to_tail(segment_ptr);
            }
        } else {
            backoff.snooze();
        }
        true
    }
}

impl<T> Default for ConcurrentQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for ConcurrentQueue<T> {
    fn drop(&mut self) {
        while self.try_dequeue().is_some() {}

        // the dequeue chain covers the active window, the enqueue chain
        // covers recycled and pre-allocated spares; the sets can overlap at
        // the currently active segment
        let mut segments: Vec<*mut ConcurrentSegment<T>> = Vec::new();
        let mut current = self.dequeues.head();
        while !current.is_null() {
            segments.push(current);
            current = unsafe { (*current).next_head() };
        }
        let mut current = self.enqueues.head();
        while !current.is_null() {
            if !segments.contains(&current) {
                segments.push(current);
            }
            current = unsafe { (*current).next_tail() };
        }
        for segment in segments {
            // SAFETY: every segment was allocated via Box::into_raw by this
            // queue and is dropped exactly once
            unsafe { drop(Box::from_raw(segment)) };
        }
    }
}

impl<T> Fifo<T> for ConcurrentQueue<T> {
    fn len(&self) -> usize {
        ConcurrentQueue::len(self)
    }

    fn enqueue(&self, item: T) {
        ConcurrentQueue::enqueue(self, item)
    }

    fn dequeue(&self) -> Result<T> {
        ConcurrentQueue::dequeue(self)
    }

    fn try_dequeue(&self) -> Option<T> {
        ConcurrentQueue::try_dequeue(self)
    }

    fn peek(&self) -> Result<T>
    where
        T: Clone,
    {
        ConcurrentQueue::peek(self)
    }

    fn try_peek(&self) -> Option<T>
    where
        T: Clone,
    {
        ConcurrentQueue::try_peek(self)
    }
}
