//! The shared hash table the sweeper scans
//!
//! This module is the storage-engine boundary: addressed slot access, the
//! optimistic acquire/release protocol, the logical clock, and the segment
//! allocator. The sweeper consumes exactly this surface; client mutators use
//! the key-addressed operations at the bottom of [`SweepTable`].
//!
//! Every slot acquisition is a single non-blocking try. A contended slot is
//! reported as unavailable and the caller abandons; nothing in this module
//! blocks, spins, or retries.

mod entry;
mod segment;

pub use entry::{EntryFlags, SlotView};
pub use segment::{Segment, SegmentAllocator, SegmentReservation};

pub(crate) use entry::{SlotData, StoredValue};

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::{Mutex, MutexGuard};

use crate::constants::MAX_IMMEDIATE_KEY;
use crate::status::SlotStatus;
use crate::util::hash_key;
use crate::value::ValueKind;

/// Geometry of a table at creation time.
#[derive(Debug, Clone, Copy)]
pub struct TableGeometry {
    /// Number of slots
    pub table_size: u64,
    /// Largest value segment the allocator will hand out
    pub max_value_size: u64,
}

impl Default for TableGeometry {
    fn default() -> Self {
        Self {
            table_size: 1024,
            max_value_size: 1024 * 1024,
        }
    }
}

/// Errors raised when creating a table.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// Geometry fields are out of range.
    #[error("invalid table geometry: {reason}")]
    InvalidGeometry {
        /// What was wrong.
        reason: &'static str,
    },
}

/// One addressable slot. The lock guards the entry body; a failed `try_lock`
/// is the "position held by another party" outcome of the optimistic
/// protocol.
#[repr(align(64))]
struct Slot {
    data: Mutex<SlotData>,
}

impl Slot {
    fn new() -> Self {
        Self {
            data: Mutex::new(SlotData::empty()),
        }
    }
}

/// An acquired slot position.
///
/// Holding the guard is the only way to mutate the entry. Dropping it is the
/// release; there is no separate unlock step to forget.
pub struct SlotGuard<'a> {
    pos: u64,
    data: MutexGuard<'a, SlotData>,
}

impl SlotGuard<'_> {
    /// Position this guard holds.
    #[inline]
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Snapshot the entry under the guard.
    pub fn view(&self) -> SlotView {
        SlotView {
            pos: self.pos,
            key: self.data.key,
            key2: self.data.key2,
            serial: self.data.serial,
            flags: self.data.flags,
            kind: self.data.kind,
            expire_stamp: self.data.expire_stamp,
            update_stamp: self.data.update_stamp,
            alloc_size: self.data.value.alloc_size(),
        }
    }

    /// Identity gate: does the entry still match an earlier read?
    #[inline]
    pub fn matches(&self, observed: &SlotView) -> bool {
        self.data.key == observed.key
            && self.data.key2 == observed.key2
            && self.data.serial == observed.serial
    }

    /// Whether the held entry carries an elapsed expiration stamp at `now`.
    pub fn is_expired(&self, now: u64) -> bool {
        self.data.flags.test(EntryFlags::EXPIRE_STAMP) && self.data.expire_stamp <= now
    }

    /// Whether the held slot is logically empty.
    pub fn is_dropped(&self) -> bool {
        self.data.flags.test(EntryFlags::DROPPED)
    }

    /// Destructive expire: the slot becomes logically empty and any segment
    /// is released. Bumps the serial.
    pub fn expire(&mut self) {
        self.data.drop_entry();
    }

    /// Set the recency marker. Does not bump the serial: marking is not a
    /// content mutation and must not invalidate other parties' reads.
    pub fn set_clock(&mut self) {
        self.data.flags.set(EntryFlags::CLOCK);
    }

    /// Swap the value's backing storage for a freshly committed segment,
    /// folding the recency mark into the same commit. Bumps the serial.
    pub fn install_segment(&mut self, seg: Segment, now: u64) {
        self.data.value = StoredValue::Segment(seg);
        self.data.serial = self.data.serial.wrapping_add(1);
        self.data.update_stamp = now;
        self.data
            .flags
            .set(EntryFlags::SEGMENT_VALUE | EntryFlags::UPDATE_STAMP | EntryFlags::CLOCK);
    }
}

/// Fixed-size slot table with a logical clock and a segment allocator.
pub struct SweepTable {
    slots: Box<[Slot]>,
    current_stamp: AtomicU64,
    base: Instant,
    allocator: SegmentAllocator,
    geometry: TableGeometry,
}

impl SweepTable {
    /// Create a table with the given geometry.
    pub fn new(geometry: TableGeometry) -> Result<Self, TableError> {
        if geometry.table_size == 0 {
            return Err(TableError::InvalidGeometry {
                reason: "table_size must be non-zero",
            });
        }
        if geometry.max_value_size == 0 {
            return Err(TableError::InvalidGeometry {
                reason: "max_value_size must be non-zero",
            });
        }
        let slots = (0..geometry.table_size).map(|_| Slot::new()).collect();
        Ok(Self {
            slots,
            current_stamp: AtomicU64::new(1),
            base: Instant::now(),
            allocator: SegmentAllocator::new(geometry.max_value_size),
            geometry,
        })
    }

    /// Number of slots.
    #[inline]
    pub fn table_size(&self) -> u64 {
        self.geometry.table_size
    }

    /// The table's geometry.
    pub fn geometry(&self) -> TableGeometry {
        self.geometry
    }

    /// The segment allocator backing this table's values.
    pub fn allocator(&self) -> &SegmentAllocator {
        &self.allocator
    }

    /// Current logical clock value in nanoseconds.
    #[inline]
    pub fn current_stamp(&self) -> u64 {
        self.current_stamp.load(Ordering::Acquire)
    }

    /// Advance the logical clock from the table's monotonic base. The
    /// embedding loop calls this periodically; stamps only move forward.
    pub fn update_current_stamp(&self) {
        let now = self.base.elapsed().as_nanos() as u64 + 1;
        self.current_stamp.fetch_max(now, Ordering::AcqRel);
    }

    /// Set the logical clock to an explicit value. Intended for embedders
    /// that own the clock (and for deterministic tests); stamps only move
    /// forward.
    pub fn set_current_stamp(&self, stamp: u64) {
        self.current_stamp.fetch_max(stamp, Ordering::AcqRel);
    }

    /// Raw slot pointer for prefetching. Never dereferenced by callers.
    #[inline]
    pub(crate) fn slot_ptr(&self, pos: u64) -> *const u8 {
        debug_assert!(pos < self.table_size());
        &self.slots[pos as usize] as *const Slot as *const u8
    }

    /// Read-only fetch of the slot at `pos`.
    ///
    /// Returns `None` when the position is out of range or momentarily held
    /// by another party; the caller skips the slot and it is revisited on a
    /// later cycle.
    pub fn fetch(&self, pos: u64) -> Option<SlotView> {
        let slot = self.slots.get(pos as usize)?;
        let data = slot.data.try_lock()?;
        Some(SlotGuard { pos, data }.view())
    }

    /// Single non-blocking acquisition attempt at `pos`.
    pub fn try_acquire(&self, pos: u64) -> Option<SlotGuard<'_>> {
        let slot = self.slots.get(pos as usize)?;
        let data = slot.data.try_lock()?;
        Some(SlotGuard { pos, data })
    }

    /// Copy the value bytes at `pos` if the entry still matches `observed`.
    ///
    /// The copy is taken under a fresh single-try acquisition so the bytes
    /// are a consistent snapshot of one serial.
    pub fn value_copy(&self, pos: u64, observed: &SlotView) -> Option<(ValueKind, Vec<u8>)> {
        let guard = self.try_acquire(pos)?;
        if !guard.matches(observed) || guard.is_dropped() {
            return None;
        }
        Some((guard.data.kind, guard.data.value.bytes().to_vec()))
    }

    /// Copy the key bytes at `pos`. `None` when busy, out of range, or the
    /// slot is logically empty.
    pub fn key_copy(&self, pos: u64) -> Option<Vec<u8>> {
        let guard = self.try_acquire(pos)?;
        if guard.is_dropped() {
            return None;
        }
        Some(guard.data.key_bytes.to_vec())
    }

    /// Re-validate that the entry at `pos` is unchanged since `observed`.
    pub fn validate_unmutated(&self, pos: u64, observed: &SlotView) -> bool {
        match self.fetch(pos) {
            Some(fresh) => fresh.same_identity(observed),
            None => false,
        }
    }

    // --- key-addressed client operations -----------------------------------
    //
    // Linear probing from the primary hash. Unlike the sweeper, client
    // operations take slot locks normally; the only holders are other
    // clients and the sweeper's short critical sections, so waits are
    // bounded. Client commits clear the recency marker: the sweeper's CLOCK
    // flag survives only until the entry is next written.

    fn acquire(&self, pos: u64) -> SlotGuard<'_> {
        let data = self.slots[pos as usize].data.lock();
        SlotGuard { pos, data }
    }

    fn probe_positions(&self, h1: u64) -> impl Iterator<Item = u64> + '_ {
        let size = self.table_size();
        let start = h1 % size;
        (0..size).map(move |i| (start + i) % size)
    }

    /// Find the position holding `key`, if present.
    pub fn position_of(&self, key: &[u8]) -> Option<u64> {
        let (h1, h2) = hash_key(key);
        for pos in self.probe_positions(h1) {
            let guard = self.acquire(pos);
            if !guard.is_dropped() && guard.data.key == h1 && guard.data.key2 == h2 {
                return Some(pos);
            }
        }
        None
    }

    /// Snapshot the entry holding `key`, if present.
    pub fn lookup(&self, key: &[u8]) -> Option<SlotView> {
        let (h1, h2) = hash_key(key);
        let pos = self.position_of(key)?;
        let guard = self.acquire(pos);
        if guard.is_dropped() || guard.data.key != h1 || guard.data.key2 != h2 {
            return None;
        }
        Some(guard.view())
    }

    fn write_entry(
        &self,
        key: &[u8],
        h1: u64,
        h2: u64,
        kind: ValueKind,
        value: StoredValue,
        guard: &mut SlotGuard<'_>,
    ) {
        let now = self.current_stamp();
        let data = &mut *guard.data;
        data.key = h1;
        data.key2 = h2;
        data.serial = data.serial.wrapping_add(1);
        data.kind = kind;
        data.expire_stamp = 0;
        data.update_stamp = now;
        data.key_bytes = key.to_vec().into_boxed_slice();
        let segment_backed = matches!(value, StoredValue::Segment(_));
        data.value = value;
        let mut flags = EntryFlags::none();
        flags.set(EntryFlags::UPDATE_STAMP);
        if segment_backed {
            flags.set(EntryFlags::SEGMENT_VALUE);
        }
        if key.len() <= MAX_IMMEDIATE_KEY {
            flags.set(EntryFlags::IMMEDIATE_KEY);
        }
        data.flags = flags;
    }

    fn upsert_raw(&self, key: &[u8], kind: ValueKind, value: StoredValue) -> SlotStatus {
        let (h1, h2) = hash_key(key);
        let mut value = Some(value);
        // The scan and the insert are separate lock acquisitions, so a
        // racing insert can claim the free slot first; rescan when it does.
        for _ in 0..8 {
            let mut first_free = None;
            for pos in self.probe_positions(h1) {
                let mut guard = self.acquire(pos);
                if guard.is_dropped() {
                    if first_free.is_none() {
                        first_free = Some(pos);
                    }
                    continue;
                }
                if guard.data.key == h1 && guard.data.key2 == h2 {
                    let value = value.take().unwrap_or_default();
                    self.write_entry(key, h1, h2, kind, value, &mut guard);
                    return SlotStatus::Ok;
                }
            }
            let Some(pos) = first_free else {
                return SlotStatus::AllocFailed;
            };
            let mut guard = self.acquire(pos);
            if !guard.is_dropped() {
                continue;
            }
            let value = value.take().unwrap_or_default();
            self.write_entry(key, h1, h2, kind, value, &mut guard);
            return SlotStatus::Ok;
        }
        SlotStatus::Busy
    }

    /// Insert or replace a small value stored inline in the slot.
    pub fn upsert_immediate(&self, key: &[u8], value: &[u8]) -> SlotStatus {
        self.upsert_raw(
            key,
            ValueKind::Other,
            StoredValue::Immediate(value.to_vec().into_boxed_slice()),
        )
    }

    /// Insert or replace a segment-backed value. The payload becomes the
    /// segment's exact contents; its length is the allocated size.
    pub fn upsert_segment(&self, key: &[u8], kind: ValueKind, payload: Vec<u8>) -> SlotStatus {
        let (h1, h2) = hash_key(key);
        let Some(mut reservation) = self.allocator.alloc(payload.len(), h1, h2) else {
            return SlotStatus::AllocFailed;
        };
        reservation.data_mut().copy_from_slice(&payload);
        self.upsert_raw(key, kind, StoredValue::Segment(reservation.commit()))
    }

    /// Attach an expiration stamp to an existing entry.
    pub fn set_expire(&self, key: &[u8], stamp: u64) -> SlotStatus {
        let Some(pos) = self.position_of(key) else {
            return SlotStatus::NotFound;
        };
        let (h1, h2) = hash_key(key);
        let mut guard = self.acquire(pos);
        if guard.is_dropped() || guard.data.key != h1 || guard.data.key2 != h2 {
            return SlotStatus::NotFound;
        }
        let data = &mut *guard.data;
        data.expire_stamp = stamp;
        data.serial = data.serial.wrapping_add(1);
        data.flags.set(EntryFlags::EXPIRE_STAMP);
        data.flags.clear(EntryFlags::CLOCK);
        SlotStatus::Ok
    }

    /// Remove an entry by key.
    pub fn remove(&self, key: &[u8]) -> SlotStatus {
        let Some(pos) = self.position_of(key) else {
            return SlotStatus::NotFound;
        };
        let mut guard = self.acquire(pos);
        if guard.is_dropped() {
            return SlotStatus::NotFound;
        }
        guard.expire();
        SlotStatus::Ok
    }
}

impl std::fmt::Debug for SweepTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SweepTable")
            .field("table_size", &self.geometry.table_size)
            .field("max_value_size", &self.geometry.max_value_size)
            .field("current_stamp", &self.current_stamp())
            .field("allocator", &self.allocator)
            .finish()
    }
}
