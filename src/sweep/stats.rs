//! Sweep outcome counters
//!
//! Lock-free counters bumped on the sweep path and read from anywhere. A
//! [`SweepStatsSnapshot`] is a plain copy suitable for logging or asserting.

use std::sync::atomic::{AtomicU64, Ordering};

/// Cumulative counters for one sweeper.
#[derive(Debug, Default)]
pub struct SweepStats {
    /// Timer ticks processed
    pub ticks: AtomicU64,
    /// Full passes over the table completed
    pub cycles_completed: AtomicU64,
    /// Slots inspected
    pub slots_inspected: AtomicU64,
    /// Entries expired and dropped
    pub entries_expired: AtomicU64,
    /// Segment values compacted
    pub values_compacted: AtomicU64,
    /// Bytes reclaimed by compaction
    pub bytes_reclaimed: AtomicU64,
    /// Recency marks set
    pub clock_marks: AtomicU64,
    /// Slots skipped because another party held them
    pub contention_skips: AtomicU64,
    /// Commits abandoned because the entry changed identity mid-flight
    pub identity_aborts: AtomicU64,
    /// Compactions abandoned because a replacement segment was refused
    pub alloc_failures: AtomicU64,
}

impl SweepStats {
    /// Fresh zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Copy the counters into a plain struct.
    pub fn snapshot(&self) -> SweepStatsSnapshot {
        SweepStatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            slots_inspected: self.slots_inspected.load(Ordering::Relaxed),
            entries_expired: self.entries_expired.load(Ordering::Relaxed),
            values_compacted: self.values_compacted.load(Ordering::Relaxed),
            bytes_reclaimed: self.bytes_reclaimed.load(Ordering::Relaxed),
            clock_marks: self.clock_marks.load(Ordering::Relaxed),
            contention_skips: self.contention_skips.load(Ordering::Relaxed),
            identity_aborts: self.identity_aborts.load(Ordering::Relaxed),
            alloc_failures: self.alloc_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SweepStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStatsSnapshot {
    /// Timer ticks processed
    pub ticks: u64,
    /// Full passes over the table completed
    pub cycles_completed: u64,
    /// Slots inspected
    pub slots_inspected: u64,
    /// Entries expired and dropped
    pub entries_expired: u64,
    /// Segment values compacted
    pub values_compacted: u64,
    /// Bytes reclaimed by compaction
    pub bytes_reclaimed: u64,
    /// Recency marks set
    pub clock_marks: u64,
    /// Slots skipped because another party held them
    pub contention_skips: u64,
    /// Commits abandoned because the entry changed identity mid-flight
    pub identity_aborts: u64,
    /// Compactions abandoned because a replacement segment was refused
    pub alloc_failures: u64,
}

impl std::fmt::Display for SweepStatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cycles={} inspected={} expired={} compacted={} reclaimed={} \
             marks={} skips={} aborts={} alloc_fail={}",
            self.cycles_completed,
            self.slots_inspected,
            self.entries_expired,
            self.values_compacted,
            self.bytes_reclaimed,
            self.clock_marks,
            self.contention_skips,
            self.identity_aborts,
            self.alloc_failures,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_copies_counters() {
        let stats = SweepStats::new();
        SweepStats::incr(&stats.slots_inspected);
        SweepStats::incr(&stats.slots_inspected);
        SweepStats::add(&stats.bytes_reclaimed, 4096);

        let snap = stats.snapshot();
        assert_eq!(snap.slots_inspected, 2);
        assert_eq!(snap.bytes_reclaimed, 4096);
        assert_eq!(snap.entries_expired, 0);
    }

    #[test]
    fn test_display_is_one_line() {
        let snap = SweepStatsSnapshot::default();
        let line = snap.to_string();
        assert!(line.contains("cycles=0"));
        assert!(!line.contains('\n'));
    }
}
