//! Fixed-capacity ring segments, the unit of storage for the queues.

pub mod concurrent;
pub mod ring;

pub use concurrent::ConcurrentSegment;
pub use ring::{Segment, SegmentRef};
