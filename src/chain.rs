//! Segment chains.
//!
//! A chain keeps a head and a tail cursor over a singly linked list of
//! segments. Two link directions coexist on every segment (`next_head`,
//! `next_tail`) so a queue's enqueue side and dequeue side can traverse the
//! same segments independently. Advancing a cursor severs the link it
//! consumed, so a segment handed to the other chain carries no stale links.

use crate::segment::ring::SegmentRef;
use crate::segment::ConcurrentSegment;
use std::sync::atomic::{AtomicPtr, Ordering};

/// Chain over [`SegmentRef`] handles for the single-threaded queue.
pub struct SegmentChain<T> {
    head: SegmentRef<T>,
    tail: SegmentRef<T>,
}

impl<T> SegmentChain<T> {
    pub fn new(root: SegmentRef<T>) -> Self {
        SegmentChain {
            head: root.clone(),
            tail: root,
        }
    }

    pub fn head(&self) -> &SegmentRef<T> {
        &self.head
    }

    pub fn tail(&self) -> &SegmentRef<T> {
        &self.tail
    }

    /// Links `segment` from the current tail via `next_head` and makes it
    /// the new tail.
    pub fn add_to_head(&mut self, segment: SegmentRef<T>) {
        self.tail.borrow_mut().set_next_head(Some(segment.clone()));
        self.tail = segment;
    }

    /// Links `segment` from the current tail via `next_tail` and makes it
    /// the new tail.
    pub fn add_to_tail(&mut self, segment: SegmentRef<T>) {
        self.tail.borrow_mut().set_next_tail(Some(segment.clone()));
        self.tail = segment;
    }

    /// Advances the head along its `next_head` link, severing the consumed
    /// link. Returns `false` when no link exists.
    pub fn move_to_next_head(&mut self) -> bool {
        let next = self.head.borrow_mut().take_next_head();
        match next {
            Some(next) => {
                self.head = next;
                true
            }
            None => false,
        }
    }

    /// Advances the head along its `next_tail` link, severing the consumed
    /// link. Returns `false` when no link exists.
    pub fn move_to_next_tail(&mut self) -> bool {
        let next = self.head.borrow_mut().take_next_tail();
        match next {
            Some(next) => {
                self.head = next;
                true
            }
            None => false,
        }
    }
}

/// Chain over raw segment pointers for the lock-free queue.
///
/// The cursors are atomics so any thread may load them, but mutation is
/// reserved for the single winner of the owning queue's transition CAS. The
/// queue owns every linked segment and frees them on drop, so a loaded
/// pointer stays valid for the queue's lifetime.
pub struct ConcurrentSegmentChain<T> {
    head: AtomicPtr<ConcurrentSegment<T>>,
    tail: AtomicPtr<ConcurrentSegment<T>>,
}

impl<T> ConcurrentSegmentChain<T> {
    /// # Safety
    ///
    /// `root` must point at a live segment that outlives the chain.
    pub unsafe fn new(root: *mut ConcurrentSegment<T>) -> Self {
        ConcurrentSegmentChain {
            head: AtomicPtr::new(root),
            tail: AtomicPtr::new(root),
        }
    }

    pub fn head(&self) -> *mut ConcurrentSegment<T> {
        self.head.load(Ordering::Acquire)
    }

    pub fn tail(&self) -> *mut ConcurrentSegment<T> {
        self.tail.load(Ordering::Acquire)
    }

    /// # Safety
    ///
    /// Caller must be the transition winner and `segment` must be live.
    pub unsafe fn add_to_head(&self, segment: *mut ConcurrentSegment<T>) {
        let tail = self.tail.load(Ordering::Acquire);
        unsafe { (*tail).set_next_head(segment) };
        self.tail.store(segment, Ordering::Release);
    }

    /// # Safety
    ///
    /// Caller must be the transition winner and `segment` must be live.
    pub unsafe fn add_to_tail(&self, segment: *mut ConcurrentSegment<T>) {
        let tail = self.tail.load(Ordering::Acquire);
        unsafe { (*tail).set_next_tail(segment) };
        self.tail.store(segment, Ordering::Release);
    }

    /// # Safety
    ///
    /// Caller must be the transition winner.
    pub unsafe fn move_to_next_head(&self) -> bool {
        let head = self.head.load(Ordering::Acquire);
        let next = unsafe { (*head).take_next_head() };
        if next.is_null() {
            return false;
        }
        self.head.store(next, Ordering::Release);
        true
    }

    /// # Safety
    ///
    /// Caller must be the transition winner.
    pub unsafe fn move_to_next_tail(&self) -> bool {
        let head = self.head.load(Ordering::Acquire);
        let next = unsafe { (*head).take_next_tail() };
        if next.is_null() {
            return false;
        }
        self.head.store(next, Ordering::Release);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Segment;
    use std::rc::Rc;

    #[test]
    fn head_and_tail_start_at_root() {
        let root = Segment::<u32>::new(2).into_ref();
        let chain = SegmentChain::new(root.clone());
        assert!(Rc::ptr_eq(chain.head(), &root));
        assert!(Rc::ptr_eq(chain.tail(), &root));
    }

    #[test]
    fn add_to_head_links_and_moves_tail() {
        let root = Segment::<u32>::new(2).into_ref();
        let mut chain = SegmentChain::new(root.clone());
        let next = Segment::<u32>::new(2).into_ref();
        chain.add_to_head(next.clone());

        assert!(Rc::ptr_eq(chain.tail(), &next));
        let linked = root.borrow().next_head();
        assert!(linked.is_some_and(|linked| Rc::ptr_eq(&linked, &next)));
    }

    #[test]
    fn move_to_next_head_severs_the_link() {
        let root = Segment::<u32>::new(2).into_ref();
        let mut chain = SegmentChain::new(root.clone());
        let next = Segment::<u32>::new(2).into_ref();
        chain.add_to_head(next.clone());

        assert!(chain.move_to_next_head());
        assert!(Rc::ptr_eq(chain.head(), &next));
        assert!(root.borrow().next_head().is_none());
        assert!(!chain.move_to_next_head());
    }

    #[test]
    fn the_two_link_directions_are_independent() {
        let root = Segment::<u32>::new(2).into_ref();
        let mut chain = SegmentChain::new(root.clone());
        let via_tail = Segment::<u32>::new(2).into_ref();
        chain.add_to_tail(via_tail.clone());

        assert!(root.borrow().next_head().is_none());
        assert!(root.borrow().next_tail().is_some());
        assert!(chain.move_to_next_tail());
        assert!(Rc::ptr_eq(chain.head(), &via_tail));
    }

    #[test]
    fn concurrent_chain_links_and_advances() {
        let root = Box::into_raw(Box::new(crate::segment::ConcurrentSegment::<u32>::new(2)));
        let next = Box::into_raw(Box::new(crate::segment::ConcurrentSegment::<u32>::new(2)));
        unsafe {
            let chain = ConcurrentSegmentChain::new(root);
            chain.add_to_tail(next);
            assert_eq!(chain.tail(), next);
            assert_eq!((*root).next_tail(), next);

            assert!(chain.move_to_next_tail());
            assert_eq!(chain.head(), next);
            assert!((*root).next_tail().is_null());
            assert!(!chain.move_to_next_tail());

            drop(Box::from_raw(root));
            drop(Box::from_raw(next));
        }
    }
}
