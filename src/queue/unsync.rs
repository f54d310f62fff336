//! Single-threaded queue.

use crate::chain::SegmentChain;
use crate::defaults;
use crate::error::{Error, Result};
use crate::queue::Fifo;
use crate::segment::Segment;
use std::cell::{Cell, RefCell};

/// Unbounded FIFO for single-producer/single-consumer or externally
/// synchronized use.
///
/// Two chains share the same segments: the enqueue chain's head is where
/// items are written, the dequeue chain's head is where they are read. When
/// the write segment fills, the next segment is taken from the enqueue
/// chain's `next_head` link or allocated, and registered as the dequeue
/// chain's new tail. A fully drained segment is handed back to the enqueue
/// chain's head for reuse, so steady-state traffic allocates nothing.
///
/// Interior mutability keeps the API `&self`; the type is `!Sync`, so the
/// compiler enforces the external-synchronization contract.
pub struct Queue<T> {
    enqueues: RefCell<SegmentChain<T>>,
    dequeues: RefCell<SegmentChain<T>>,
    count: Cell<usize>,
    segment_size: usize,
}

impl<T> Queue<T> {
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
        let root = Segment::new(segment_size).into_ref();
        Queue {
            enqueues: RefCell::new(SegmentChain::new(root.clone())),
            dequeues: RefCell::new(SegmentChain::new(root)),
            count: Cell::new(0),
            segment_size,
        }
    }

    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    pub fn len(&self) -> usize {
        self.count.get()
    }

    pub fn is_empty(&self) -> bool {
        self.count.get() == 0
    }

    pub fn enqueue(&self, item: T) {
        let item = {
            let enqueues = self.enqueues.borrow();
            let result = match enqueues.head().borrow_mut().try_write(item, true) {
                Ok(()) => {
                    self.count.set(self.count.get() + 1);
                    return;
                }
                Err(item) => item,
            };
            result
        };

        self.move_to_next_enqueue();

        let enqueues = self.enqueues.borrow();
        if enqueues.head().borrow_mut().try_write(item, true).is_err() {
            unreachable!("fresh segment rejected a write");
        }
        self.count.set(self.count.get() + 1);
    }

    pub fn dequeue(&self) -> Result<T> {
        self.try_dequeue().ok_or(Error::Underflow)
    }

    pub fn try_dequeue(&self) -> Option<T> {
        let mut item = self.dequeues.borrow().head().borrow_mut().try_read();

        if item.is_none() && self.dequeue_successor_exists() {
            self.move_to_next_dequeue();
            item = self.dequeues.borrow().head().borrow_mut().try_read();
        }

        if item.is_some() {
            self.count.set(self.count.get() - 1);
        }
        item
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
        let item = self.dequeues.borrow().head().borrow().try_peek();
        if item.is_some() {
            return item;
        }
        if !self.dequeue_successor_exists() {
            return None;
        }
        self.move_to_next_dequeue();
        self.dequeues.borrow().head().borrow().try_peek()
    }

    fn dequeue_successor_exists(&self) -> bool {
        self.dequeues.borrow().head().borrow().next_tail().is_some()
    }

    /// Advances the write cursor to the next segment, reusing a recycled one
    /// when the link already exists, and registers it with the dequeue chain.
    fn move_to_next_enqueue(&self) {
        let mut enqueues = self.enqueues.borrow_mut();
        let next = enqueues.head().borrow().next_head();
        let next = match next {
            Some(next) => next,
            None => {
                let size = enqueues.tail().borrow().capacity();
                tracing::trace!(size, "allocating queue segment");
                let fresh = Segment::new(size).into_ref();
                enqueues.add_to_head(fresh.clone());
                fresh
            }
        };
        enqueues.move_to_next_head();
        self.dequeues.borrow_mut().add_to_tail(next);
    }

    /// Advances the read cursor and hands the drained segment back to the
    /// enqueue chain's head for reuse.
    fn move_to_next_dequeue(&self) {
        let mut dequeues = self.dequeues.borrow_mut();
        let drained = dequeues.head().clone();
        dequeues.move_to_next_tail();
        self.enqueues.borrow_mut().add_to_head(drained);
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Fifo<T> for Queue<T> {
    fn len(&self) -> usize {
        Queue::len(self)
    }

    fn enqueue(&self, item: T) {
        Queue::enqueue(self, item)
    }

    fn dequeue(&self) -> Result<T> {
        Queue::dequeue(self)
    }

    fn try_dequeue(&self) -> Option<T> {
        Queue::try_dequeue(self)
    }

    fn peek(&self) -> Result<T>
    where
        T: Clone,
    {
        Queue::peek(self)
    }

    fn try_peek(&self) -> Option<T>
    where
        T: Clone,
    {
        Queue::try_peek(self)
    }
}
