//! Type-specific value compaction
//!
//! A segment value whose logical contents have shrunk well below its
//! allocation is repacked into a right-sized replacement segment. The whole
//! operation runs on copies; the slot is touched only twice, once for the
//! initial read and once for the commit, and the commit is gated on the
//! identity triple so a concurrent mutation abandons the work instead of
//! clobbering it.

use crate::status::SlotStatus;
use crate::sweep::stats::SweepStats;
use crate::table::{EntryFlags, SlotView, SweepTable};
use crate::value::{CompositeValue, HashValue, ListValue, SetValue, ValueKind, ZSetValue};

/// One in-flight shrink attempt over a decoded value copy.
struct ShrinkCtx<V: CompositeValue> {
    value: V,
    view: SlotView,
}

impl<V: CompositeValue> ShrinkCtx<V> {
    /// Read and decode the value at `view`. `None` when the slot is busy,
    /// the entry changed since the read, or the bytes do not decode as `V`.
    fn open(table: &SweepTable, view: &SlotView) -> Option<Self> {
        let (kind, bytes) = table.value_copy(view.pos, view)?;
        if kind != V::KIND {
            return None;
        }
        let value = V::open(bytes).ok()?;
        Some(Self { value, view: *view })
    }

    /// Whether repacking would actually reclaim space.
    fn can_shrink(&self) -> bool {
        (self.value.used_size() as u64) < self.view.alloc_size
    }

    /// Repack into a right-sized segment and commit it under the identity
    /// gate.
    fn shrink(&self, table: &SweepTable, stats: &SweepStats) -> SlotStatus {
        let used = self.value.used_size();
        let Some(mut reservation) = table
            .allocator()
            .alloc(used, self.view.key, self.view.key2)
        else {
            SweepStats::incr(&stats.alloc_failures);
            return SlotStatus::AllocFailed;
        };
        if self.value.copy_into(reservation.data_mut()).is_err() {
            // Decoded fine but will not repack; leave the original alone.
            return SlotStatus::NoShrink;
        }

        let Some(mut guard) = table.try_acquire(self.view.pos) else {
            SweepStats::incr(&stats.contention_skips);
            return SlotStatus::Busy;
        };
        if !guard.matches(&self.view) || guard.is_dropped() {
            // The entry moved on; the reservation is released on drop.
            SweepStats::incr(&stats.identity_aborts);
            return SlotStatus::Mutated;
        }

        let reclaimed = self.view.alloc_size - used as u64;
        guard.install_segment(reservation.commit(), table.current_stamp());
        drop(guard);

        SweepStats::incr(&stats.values_compacted);
        SweepStats::add(&stats.bytes_reclaimed, reclaimed);

        if tracing::enabled!(tracing::Level::DEBUG) {
            let key = table
                .key_copy(self.view.pos)
                .map(|k| String::from_utf8_lossy(&k).into_owned())
                .unwrap_or_default();
            tracing::debug!(
                key = %key,
                kind = %V::KIND,
                count = self.value.element_count(),
                used,
                alloc = self.view.alloc_size,
                "resized"
            );
        }
        SlotStatus::Ok
    }
}

fn run<V: CompositeValue>(table: &SweepTable, view: &SlotView, stats: &SweepStats) -> SlotStatus {
    let Some(ctx) = ShrinkCtx::<V>::open(table, view) else {
        SweepStats::incr(&stats.identity_aborts);
        return SlotStatus::Mutated;
    };
    if !ctx.can_shrink() {
        return SlotStatus::NoShrink;
    }
    // Identity revalidation before paying for the repack. Entries with the
    // key stored out of line already had it read under the same gate.
    if !view.flags.test(EntryFlags::IMMEDIATE_KEY) && !table.validate_unmutated(view.pos, view) {
        SweepStats::incr(&stats.identity_aborts);
        return SlotStatus::Mutated;
    }
    ctx.shrink(table, stats)
}

/// Try to compact the segment value observed at `view`.
///
/// Dispatches on the entry's type tag; non-composite kinds are never
/// repacked.
pub(crate) fn compact_slot(table: &SweepTable, view: &SlotView, stats: &SweepStats) -> SlotStatus {
    match view.kind {
        ValueKind::List => run::<ListValue>(table, view, stats),
        ValueKind::Hash => run::<HashValue>(table, view, stats),
        ValueKind::Set => run::<SetValue>(table, view, stats),
        ValueKind::SortedSet => run::<ZSetValue>(table, view, stats),
        ValueKind::Other => SlotStatus::NoShrink,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TableGeometry;

    fn table() -> SweepTable {
        SweepTable::new(TableGeometry {
            table_size: 32,
            max_value_size: 1024 * 1024,
        })
        .unwrap()
    }

    fn oversized_list(elems: usize) -> ListValue {
        // Large capacity, small contents: plainly shrinkable.
        let mut list = ListValue::with_capacity(256, 8192);
        for i in 0..elems {
            list.push(format!("elem-{i}").as_bytes()).unwrap();
        }
        list
    }

    #[test]
    fn test_compact_shrinks_to_used_size() {
        let table = table();
        let stats = SweepStats::new();
        let list = oversized_list(4);
        let used = list.used_size() as u64;

        table.upsert_segment(b"l", ValueKind::List, list.into_bytes());
        let view = table.lookup(b"l").unwrap();
        assert!(view.alloc_size > used);

        assert_eq!(compact_slot(&table, &view, &stats), SlotStatus::Ok);

        let after = table.lookup(b"l").unwrap();
        assert_eq!(after.alloc_size, used);
        assert!(after.flags.test(EntryFlags::CLOCK));
        assert_eq!(after.serial, view.serial + 1);

        let snap = stats.snapshot();
        assert_eq!(snap.values_compacted, 1);
        assert_eq!(snap.bytes_reclaimed, view.alloc_size - used);
    }

    #[test]
    fn test_compact_preserves_contents() {
        let table = table();
        let stats = SweepStats::new();
        table.upsert_segment(b"l", ValueKind::List, oversized_list(10).into_bytes());
        let view = table.lookup(b"l").unwrap();

        assert_eq!(compact_slot(&table, &view, &stats), SlotStatus::Ok);

        let after = table.lookup(b"l").unwrap();
        let (_, bytes) = table.value_copy(after.pos, &after).unwrap();
        let list = ListValue::open(bytes).unwrap();
        assert_eq!(list.len(), 10);
        for i in 0..10 {
            assert_eq!(list.get(i).unwrap(), format!("elem-{i}").as_bytes());
        }
    }

    #[test]
    fn test_compact_noop_when_already_tight() {
        let table = table();
        let stats = SweepStats::new();
        table.upsert_segment(b"l", ValueKind::List, oversized_list(4).into_bytes());
        let view = table.lookup(b"l").unwrap();
        assert_eq!(compact_slot(&table, &view, &stats), SlotStatus::Ok);

        // A second attempt has nothing left to reclaim.
        let tight = table.lookup(b"l").unwrap();
        assert_eq!(compact_slot(&table, &tight, &stats), SlotStatus::NoShrink);
        assert_eq!(stats.snapshot().values_compacted, 1);
    }

    #[test]
    fn test_compact_abandons_on_identity_change() {
        let table = table();
        let stats = SweepStats::new();
        table.upsert_segment(b"l", ValueKind::List, oversized_list(4).into_bytes());
        let view = table.lookup(b"l").unwrap();
        let live_before = table.allocator().live_segments();

        // Concurrent writer replaces the value after our read.
        table.upsert_segment(b"l", ValueKind::List, oversized_list(2).into_bytes());

        assert_eq!(compact_slot(&table, &view, &stats), SlotStatus::Mutated);
        assert_eq!(stats.snapshot().identity_aborts, 1);
        assert_eq!(stats.snapshot().values_compacted, 0);
        // No leaked reservation.
        assert_eq!(table.allocator().live_segments(), live_before);
    }

    #[test]
    fn test_compact_other_kind_is_never_repacked() {
        let table = table();
        let stats = SweepStats::new();
        table.upsert_segment(b"blob", ValueKind::Other, vec![0u8; 512]);
        let view = table.lookup(b"blob").unwrap();
        assert_eq!(compact_slot(&table, &view, &stats), SlotStatus::NoShrink);
    }
}
