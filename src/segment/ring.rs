//! Single-threaded ring segment.

use crate::error::{Error, Result};
use std::cell::RefCell;
use std::rc::Rc;

/// Shared handle to a segment linked into one or both of a queue's chains.
pub type SegmentRef<T> = Rc<RefCell<Segment<T>>>;

/// Fixed-capacity circular buffer with monotonically increasing head/tail
/// cursors. The cursors are counters, not indices; the physical slot is the
/// counter modulo the capacity, and `0 <= tail - head <= capacity` always
/// holds.
///
/// Two independent forward links (`next_head`, `next_tail`) let an enqueue
/// chain and a dequeue chain traverse the same segments separately.
pub struct Segment<T> {
    items: Box<[Option<T>]>,
    head: usize,
    tail: usize,
    next_head: Option<SegmentRef<T>>,
    next_tail: Option<SegmentRef<T>>,
}

impl<T> Segment<T> {
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0);
        let mut items = Vec::with_capacity(capacity);
        items.resize_with(capacity, || None);
        Segment {
            items: items.into_boxed_slice(),
            head: 0,
            tail: 0,
            next_head: None,
            next_tail: None,
        }
    }

    pub fn into_ref(self) -> SegmentRef<T> {
        Rc::new(RefCell::new(self))
    }

    pub fn capacity(&self) -> usize {
        self.items.len()
    }

    pub fn head(&self) -> usize {
        self.head
    }

    pub fn tail(&self) -> usize {
        self.tail
    }

    pub fn len(&self) -> usize {
        self.tail - self.head
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    pub fn next_head(&self) -> Option<SegmentRef<T>> {
        self.next_head.clone()
    }

    pub fn next_tail(&self) -> Option<SegmentRef<T>> {
        self.next_tail.clone()
    }

    pub(crate) fn set_next_head(&mut self, next: Option<SegmentRef<T>>) {
        self.next_head = next;
    }

    pub(crate) fn set_next_tail(&mut self, next: Option<SegmentRef<T>>) {
        self.next_tail = next;
    }

    pub(crate) fn take_next_head(&mut self) -> Option<SegmentRef<T>> {
        self.next_head.take()
    }

    pub(crate) fn take_next_tail(&mut self) -> Option<SegmentRef<T>> {
        self.next_tail.take()
    }

    /// Writes into the slot at the tail cursor, handing the item back when
    /// the segment is full. With `advance = false` the slot is touched but
    /// not claimed; the next write overwrites it.
    pub fn try_write(&mut self, item: T, advance: bool) -> std::result::Result<(), T> {
        if self.is_full() {
            return Err(item);
        }
        let index = self.tail % self.capacity();
        self.items[index] = Some(item);
        if advance {
            self.tail += 1;
        }
        Ok(())
    }

    pub fn write(&mut self, item: T, advance: bool) -> Result<()> {
        self.try_write(item, advance).map_err(|_| Error::Overflow)
    }

    /// Takes the item at the head cursor and advances it.
    pub fn try_read(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let index = self.head % self.capacity();
        let item = self.items[index].take();
        self.head += 1;
        item
    }

    pub fn read(&mut self) -> Result<T> {
        self.try_read().ok_or(Error::Underflow)
    }

    /// Observes the item at the head cursor without advancing it.
    pub fn try_peek(&self) -> Option<T>
    where
        T: Clone,
    {
        if self.is_empty() {
            return None;
        }
        let index = self.head % self.capacity();
        self.items[index].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn writes_and_reads_in_order() {
        let mut segment = Segment::new(4);
        for value in 0..4 {
            assert!(segment.try_write(value, true).is_ok());
        }
        for value in 0..4 {
            assert_eq!(segment.try_read(), Some(value));
        }
        assert_eq!(segment.try_read(), None);
    }

    #[test]
    fn write_fails_when_full() {
        let mut segment = Segment::new(2);
        segment.try_write(1, true).ok();
        segment.try_write(2, true).ok();
        assert_eq!(segment.try_write(3, true), Err(3));
        assert_eq!(segment.write(3, true), Err(Error::Overflow));
    }

    #[test]
    fn read_fails_when_empty() {
        let mut segment = Segment::<u32>::new(2);
        assert_eq!(segment.read(), Err(Error::Underflow));
    }

    #[test]
    fn peek_does_not_advance() {
        let mut segment = Segment::new(2);
        segment.try_write(7, true).ok();
        assert_eq!(segment.try_peek(), Some(7));
        assert_eq!(segment.try_peek(), Some(7));
        assert_eq!(segment.try_read(), Some(7));
        assert_eq!(segment.try_peek(), None);
    }

    #[test]
    fn non_advancing_write_is_overwritten() {
        let mut segment = Segment::new(2);
        segment.try_write(1, false).ok();
        segment.try_write(2, true).ok();
        assert_eq!(segment.try_read(), Some(2));
    }

    #[test]
    fn cursors_wrap_around_capacity() {
        let mut segment = Segment::new(2);
        for round in 0..5 {
            segment.try_write(round * 2, true).ok();
            segment.try_write(round * 2 + 1, true).ok();
            assert_eq!(segment.try_read(), Some(round * 2));
            assert_eq!(segment.try_read(), Some(round * 2 + 1));
        }
        assert_eq!(segment.head(), 10);
        assert_eq!(segment.tail(), 10);
    }

    proptest! {
        #[test]
        fn capacity_invariant_holds(
            operations in proptest::collection::vec(any::<bool>(), 1..200),
            capacity in 1usize..8,
        ) {
            let mut segment = Segment::new(capacity);
            for write in operations {
                if write {
                    let _ = segment.try_write(0u32, true);
                } else {
                    let _ = segment.try_read();
                }
                prop_assert!(segment.tail() >= segment.head());
                prop_assert!(segment.tail() - segment.head() <= segment.capacity());
            }
        }
    }
}
