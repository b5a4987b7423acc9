//! Per-slot inspection
//!
//! `check_slot` is the decision chain run once per inspected slot: skip empty
//! or contended slots, expire elapsed entries, and otherwise either compact
//! an idle segment value or set the recency mark. Exactly one action is taken
//! per visit; anything abandoned is retried naturally on a later cycle.

use crate::status::SlotStatus;
use crate::sweep::compact::compact_slot;
use crate::sweep::stats::SweepStats;
use crate::table::{EntryFlags, SlotView, SweepTable};

fn try_expire(table: &SweepTable, pos: u64, now: u64, stats: &SweepStats) -> SlotStatus {
    let Some(mut guard) = table.try_acquire(pos) else {
        SweepStats::incr(&stats.contention_skips);
        return SlotStatus::Busy;
    };
    // Only the expiry predicate is re-checked under the lock. If another
    // party replaced the entry meanwhile, an entry that is expired *now* is
    // still correct to drop, and one that is not is left alone.
    if !guard.is_expired(now) {
        return SlotStatus::Ok;
    }
    guard.expire();
    drop(guard);
    SweepStats::incr(&stats.entries_expired);
    SlotStatus::Expired
}

fn set_clock(table: &SweepTable, pos: u64, view: &SlotView, stats: &SweepStats) -> SlotStatus {
    let Some(mut guard) = table.try_acquire(pos) else {
        SweepStats::incr(&stats.contention_skips);
        return SlotStatus::Busy;
    };
    if !guard.matches(view) {
        SweepStats::incr(&stats.identity_aborts);
        return SlotStatus::Mutated;
    }
    guard.set_clock();
    SweepStats::incr(&stats.clock_marks);
    SlotStatus::Ok
}

/// Inspect one slot position.
///
/// `now` is the logical clock at tick start; `idle_floor` is `now` minus the
/// compaction hysteresis.
pub(crate) fn check_slot(
    table: &SweepTable,
    pos: u64,
    now: u64,
    idle_floor: u64,
    stats: &SweepStats,
) -> SlotStatus {
    SweepStats::incr(&stats.slots_inspected);

    let Some(view) = table.fetch(pos) else {
        if pos >= table.table_size() {
            return SlotStatus::OutOfRange;
        }
        SweepStats::incr(&stats.contention_skips);
        return SlotStatus::Busy;
    };

    if view.flags.test(EntryFlags::DROPPED) {
        return SlotStatus::Dropped;
    }

    if view.is_expired(now) {
        return try_expire(table, pos, now, stats);
    }

    // Already marked recently used; nothing else to do this visit.
    if view.flags.test(EntryFlags::CLOCK) {
        return SlotStatus::Ok;
    }

    if view.flags.test(EntryFlags::SEGMENT_VALUE)
        && view.kind.is_composite()
        && view.idle_since(idle_floor)
    {
        let status = compact_slot(table, &view, stats);
        if status != SlotStatus::NoShrink {
            return status;
        }
        // Nothing to reclaim: fall through and mark recency as usual.
    }

    set_clock(table, pos, &view, stats)
}
