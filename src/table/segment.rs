//! Segment allocation for values too large to store inline
//!
//! Segments are owned byte blocks with explicit commit/abandon semantics.
//! The allocator hands out a [`SegmentReservation`] that is not yet visible
//! to anyone; committing it yields a [`Segment`] that can be swapped into a
//! slot, while dropping the reservation on any other path releases the
//! storage. Live-segment accounting makes leaks observable in tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A committed variable-size value block.
pub struct Segment {
    buf: Box<[u8]>,
    live: Arc<AtomicU64>,
}

impl Segment {
    /// Size of the block in bytes (the value's allocated size).
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the block is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Read access to the block.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Write access to the block.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Segment({} bytes)", self.buf.len())
    }
}

/// A pending allocation, tagged with the key hash pair it is intended to
/// replace. Invisible to readers until committed; released on drop.
pub struct SegmentReservation {
    seg: Option<Segment>,
    key: u64,
    key2: u64,
}

impl SegmentReservation {
    /// The key hash pair this reservation was registered for.
    #[inline]
    pub fn key_hash(&self) -> (u64, u64) {
        (self.key, self.key2)
    }

    /// Write access to the reserved block.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.seg.as_mut().expect("reservation not committed").as_mut_slice()
    }

    /// Size of the reserved block.
    pub fn len(&self) -> usize {
        self.seg.as_ref().expect("reservation not committed").len()
    }

    /// Whether the reserved block is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take ownership of the block for installation into a slot.
    pub fn commit(mut self) -> Segment {
        self.seg.take().expect("reservation already committed")
    }
}

impl Drop for SegmentReservation {
    fn drop(&mut self) {
        // Uncommitted reservation: the inner Segment's drop releases it.
        self.seg.take();
    }
}

/// Allocator for value segments with live/outstanding accounting.
pub struct SegmentAllocator {
    live: Arc<AtomicU64>,
    allocations: AtomicU64,
    failures: AtomicU64,
    max_segment_size: u64,
}

impl SegmentAllocator {
    /// Create an allocator that refuses blocks larger than `max_segment_size`.
    pub fn new(max_segment_size: u64) -> Self {
        Self {
            live: Arc::new(AtomicU64::new(0)),
            allocations: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            max_segment_size,
        }
    }

    /// Allocate a zeroed block of exactly `size` bytes, registered for the
    /// given key hash pair. Returns `None` when the request exceeds the
    /// allocator's limit.
    pub fn alloc(&self, size: usize, key: u64, key2: u64) -> Option<SegmentReservation> {
        if size == 0 || size as u64 > self.max_segment_size {
            self.failures.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        self.allocations.fetch_add(1, Ordering::Relaxed);
        self.live.fetch_add(1, Ordering::Relaxed);
        Some(SegmentReservation {
            seg: Some(Segment {
                buf: vec![0u8; size].into_boxed_slice(),
                live: Arc::clone(&self.live),
            }),
            key,
            key2,
        })
    }

    /// Number of segments currently alive (committed or reserved).
    pub fn live_segments(&self) -> u64 {
        self.live.load(Ordering::Relaxed)
    }

    /// Total successful allocations.
    pub fn allocations(&self) -> u64 {
        self.allocations.load(Ordering::Relaxed)
    }

    /// Total refused allocations.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// The largest block this allocator will hand out.
    pub fn max_segment_size(&self) -> u64 {
        self.max_segment_size
    }
}

impl std::fmt::Debug for SegmentAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentAllocator")
            .field("live", &self.live_segments())
            .field("allocations", &self.allocations())
            .field("failures", &self.failures())
            .field("max_segment_size", &self.max_segment_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_commit() {
        let alloc = SegmentAllocator::new(1024);
        let mut res = alloc.alloc(16, 1, 2).unwrap();
        assert_eq!(alloc.live_segments(), 1);
        assert_eq!(res.key_hash(), (1, 2));

        res.data_mut()[0] = 42;
        let seg = res.commit();
        assert_eq!(alloc.live_segments(), 1);
        assert_eq!(seg.as_slice()[0], 42);
        assert_eq!(seg.len(), 16);

        drop(seg);
        assert_eq!(alloc.live_segments(), 0);
    }

    #[test]
    fn test_abandoned_reservation_is_released() {
        let alloc = SegmentAllocator::new(1024);
        let res = alloc.alloc(16, 1, 2).unwrap();
        assert_eq!(alloc.live_segments(), 1);

        drop(res);
        assert_eq!(alloc.live_segments(), 0);
        assert_eq!(alloc.allocations(), 1);
    }

    #[test]
    fn test_alloc_respects_limit() {
        let alloc = SegmentAllocator::new(64);
        assert!(alloc.alloc(64, 0, 0).is_some());
        assert!(alloc.alloc(65, 0, 0).is_none());
        assert!(alloc.alloc(0, 0, 0).is_none());
        assert_eq!(alloc.failures(), 2);
    }

    #[test]
    fn test_alloc_zeroes_block() {
        let alloc = SegmentAllocator::new(1024);
        let res = alloc.alloc(32, 0, 0).unwrap();
        let seg = res.commit();
        assert!(seg.as_slice().iter().all(|&b| b == 0));
    }
}
