//! Single-producer single-consumer segment ring.
//!
//! The preparer (main loop) publishes segments through `head`; the step
//! generator (timer interrupt) consumes through `tail`. Each index is
//! written by exactly one side and read by the other, so the ring is
//! lock-free: a release store on publication pairs with an acquire load on
//! the opposite side, which also orders the slot contents written before
//! the index moved. On single-core interrupt-driven targets these collapse
//! to plain ordered accesses.

use core::sync::atomic::{AtomicUsize, Ordering};

use super::segment::Segment;

/// Number of segment slots.
///
/// Sized so a full ring represents well under the preparer's refill window
/// at the default timebase (see config validation).
pub const SEGMENT_RING_CAPACITY: usize = 6;

/// Number of shared block data entries.
///
/// One less than the segment capacity: at most that many distinct blocks can
/// have segments queued at once, so the preparer can never rotate onto a
/// data entry still referenced by a queued or executing segment.
pub(crate) const DATA_RING_CAPACITY: usize = SEGMENT_RING_CAPACITY - 1;

/// Bounded SPSC ring of prepared segments.
pub(crate) struct SegmentRing {
    segments: [Segment; SEGMENT_RING_CAPACITY],
    /// Next free slot. Written only by the producer.
    head: AtomicUsize,
    /// Next segment to execute. Written only by the consumer.
    tail: AtomicUsize,
}

impl SegmentRing {
    pub fn new() -> Self {
        Self {
            segments: [Segment::EMPTY; SEGMENT_RING_CAPACITY],
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Empty the ring. Producer and consumer must both be stopped.
    pub fn clear(&mut self) {
        self.head.store(0, Ordering::Relaxed);
        self.tail.store(0, Ordering::Relaxed);
    }

    /// Producer: whether a push would overwrite an unconsumed segment.
    #[inline]
    pub fn is_full(&self) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        (head + 1) % SEGMENT_RING_CAPACITY == tail
    }

    /// Producer: publish a segment. Caller must have checked `is_full`.
    pub fn push(&mut self, segment: Segment) {
        let head = self.head.load(Ordering::Relaxed);
        self.segments[head] = segment;
        self.head
            .store((head + 1) % SEGMENT_RING_CAPACITY, Ordering::Release);
    }

    /// Consumer: the segment at the tail, if any.
    #[inline]
    pub fn peek(&self) -> Option<Segment> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail == head {
            None
        } else {
            Some(self.segments[tail])
        }
    }

    /// Consumer: discard the segment at the tail after executing it.
    #[inline]
    pub fn advance_tail(&self) {
        let tail = self.tail.load(Ordering::Relaxed);
        self.tail
            .store((tail + 1) % SEGMENT_RING_CAPACITY, Ordering::Release);
    }

    /// Number of queued segments.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        (head + SEGMENT_RING_CAPACITY - tail) % SEGMENT_RING_CAPACITY
    }

    /// Queued segments in execution order, oldest first.
    #[cfg(test)]
    pub fn queued(&self) -> impl Iterator<Item = &Segment> {
        let tail = self.tail.load(Ordering::Relaxed);
        let len = self.len();
        (0..len).map(move |i| &self.segments[(tail + i) % SEGMENT_RING_CAPACITY])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(n_step: u8) -> Segment {
        Segment {
            n_step,
            ..Segment::EMPTY
        }
    }

    #[test]
    fn test_empty_ring() {
        let ring = SegmentRing::new();
        assert!(ring.peek().is_none());
        assert!(!ring.is_full());
        assert_eq!(ring.len(), 0);
    }

    #[test]
    fn test_push_peek_advance() {
        let mut ring = SegmentRing::new();
        ring.push(segment(3));
        ring.push(segment(7));

        assert_eq!(ring.len(), 2);
        assert_eq!(ring.peek().unwrap().n_step, 3);

        ring.advance_tail();
        assert_eq!(ring.peek().unwrap().n_step, 7);

        ring.advance_tail();
        assert!(ring.peek().is_none());
    }

    #[test]
    fn test_full_at_capacity_minus_one() {
        let mut ring = SegmentRing::new();
        for i in 0..SEGMENT_RING_CAPACITY - 1 {
            assert!(!ring.is_full());
            ring.push(segment(i as u8 + 1));
        }
        assert!(ring.is_full());
        assert_eq!(ring.len(), SEGMENT_RING_CAPACITY - 1);
    }

    #[test]
    fn test_wraparound_preserves_order() {
        let mut ring = SegmentRing::new();
        // Cycle enough segments through to wrap the indices twice.
        let mut next = 1u8;
        let mut expect = 1u8;
        for _ in 0..3 * SEGMENT_RING_CAPACITY {
            while !ring.is_full() {
                ring.push(segment(next));
                next = next.wrapping_add(1);
            }
            assert_eq!(ring.peek().unwrap().n_step, expect);
            ring.advance_tail();
            expect = expect.wrapping_add(1);
        }
    }

    #[test]
    fn test_clear_resets_indices() {
        let mut ring = SegmentRing::new();
        ring.push(segment(1));
        ring.push(segment(2));
        ring.clear();
        assert!(ring.peek().is_none());
        assert_eq!(ring.len(), 0);
    }
}
