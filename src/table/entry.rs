//! Slot entry records and flag bits
//!
//! Each table slot holds one fixed-shape entry record: the key hash pair used
//! for identity checks, a serial number bumped on every committed mutation,
//! a flag word, expiration/update stamps, and the value (inline bytes or a
//! reference to a separately allocated segment).

use crate::table::segment::Segment;
use crate::value::ValueKind;

/// Per-entry flag bits, packed into a 16-bit word.
#[repr(transparent)]
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryFlags(u16);

impl EntryFlags {
    /// Slot is logically empty; sweeping skips it entirely
    pub const DROPPED: u16 = 1 << 0;
    /// Entry carries an expiration stamp
    pub const EXPIRE_STAMP: u16 = 1 << 1;
    /// Entry carries a last-update stamp
    pub const UPDATE_STAMP: u16 = 1 << 2;
    /// Recency marker set by the sweeper; cleared on the next client commit
    pub const CLOCK: u16 = 1 << 3;
    /// Value lives in a separately allocated segment
    pub const SEGMENT_VALUE: u16 = 1 << 4;
    /// Key bytes are stored inline in the slot record
    pub const IMMEDIATE_KEY: u16 = 1 << 5;

    /// Empty flag word
    pub const fn none() -> Self {
        Self(0)
    }

    /// Flag word for an empty slot
    pub const fn dropped() -> Self {
        Self(Self::DROPPED)
    }

    /// Test whether all bits in `mask` are set
    #[inline]
    pub const fn test(&self, mask: u16) -> bool {
        (self.0 & mask) == mask
    }

    /// Set the bits in `mask`
    #[inline]
    pub fn set(&mut self, mask: u16) {
        self.0 |= mask;
    }

    /// Clear the bits in `mask`
    #[inline]
    pub fn clear(&mut self, mask: u16) {
        self.0 &= !mask;
    }

    /// Get the raw flag word
    #[inline]
    pub const fn bits(&self) -> u16 {
        self.0
    }
}

impl std::fmt::Debug for EntryFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names = Vec::new();
        for (bit, name) in [
            (Self::DROPPED, "DROPPED"),
            (Self::EXPIRE_STAMP, "EXPIRE_STAMP"),
            (Self::UPDATE_STAMP, "UPDATE_STAMP"),
            (Self::CLOCK, "CLOCK"),
            (Self::SEGMENT_VALUE, "SEGMENT_VALUE"),
            (Self::IMMEDIATE_KEY, "IMMEDIATE_KEY"),
        ] {
            if self.test(bit) {
                names.push(name);
            }
        }
        write!(f, "EntryFlags({})", names.join("|"))
    }
}

/// Value storage inside a slot record.
#[derive(Debug, Default)]
pub(crate) enum StoredValue {
    /// No value
    #[default]
    None,
    /// Small value stored inline in the entry record
    Immediate(Box<[u8]>),
    /// Value in a separately allocated, resizable segment
    Segment(Segment),
}

impl StoredValue {
    /// Allocated size of the backing storage, in bytes.
    pub(crate) fn alloc_size(&self) -> u64 {
        match self {
            StoredValue::None => 0,
            StoredValue::Immediate(bytes) => bytes.len() as u64,
            StoredValue::Segment(seg) => seg.len() as u64,
        }
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        match self {
            StoredValue::None => &[],
            StoredValue::Immediate(bytes) => bytes,
            StoredValue::Segment(seg) => seg.as_slice(),
        }
    }
}

/// The mutable body of a slot, guarded by the slot's try-lock.
#[derive(Debug, Default)]
pub(crate) struct SlotData {
    /// Primary key hash
    pub key: u64,
    /// Secondary key hash
    pub key2: u64,
    /// Serial number, incremented on every committed mutation
    pub serial: u64,
    /// Flag word
    pub flags: EntryFlags,
    /// Type tag of the stored value
    pub kind: ValueKind,
    /// Expiration stamp (ns, valid when EXPIRE_STAMP is set)
    pub expire_stamp: u64,
    /// Last-update stamp (ns, valid when UPDATE_STAMP is set)
    pub update_stamp: u64,
    /// Key bytes
    pub key_bytes: Box<[u8]>,
    /// Stored value
    pub value: StoredValue,
}

impl SlotData {
    /// Fresh empty slot body.
    pub(crate) fn empty() -> Self {
        Self {
            flags: EntryFlags::dropped(),
            ..Self::default()
        }
    }

    /// Reset the slot to logically empty, releasing any segment.
    pub(crate) fn drop_entry(&mut self) {
        self.key = 0;
        self.key2 = 0;
        self.serial = self.serial.wrapping_add(1);
        self.flags = EntryFlags::dropped();
        self.kind = ValueKind::Other;
        self.expire_stamp = 0;
        self.update_stamp = 0;
        self.key_bytes = Box::default();
        self.value = StoredValue::None;
    }
}

/// Read-only snapshot of a slot's identity and metadata.
///
/// Captured by [`SweepTable::fetch`](crate::table::SweepTable::fetch); the
/// `(key, key2, serial)` triple is the sole mechanism for detecting that a
/// slot still holds the same logical entry at commit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotView {
    /// Slot position
    pub pos: u64,
    /// Primary key hash
    pub key: u64,
    /// Secondary key hash
    pub key2: u64,
    /// Serial number at read time
    pub serial: u64,
    /// Flag word at read time
    pub flags: EntryFlags,
    /// Value type tag
    pub kind: ValueKind,
    /// Expiration stamp (valid when EXPIRE_STAMP is set)
    pub expire_stamp: u64,
    /// Last-update stamp (valid when UPDATE_STAMP is set)
    pub update_stamp: u64,
    /// Allocated size of the value's backing storage
    pub alloc_size: u64,
}

impl SlotView {
    /// Check whether another read observed the same logical entry.
    #[inline]
    pub fn same_identity(&self, other: &SlotView) -> bool {
        self.key == other.key && self.key2 == other.key2 && self.serial == other.serial
    }

    /// Whether the entry carries an elapsed expiration stamp at `now`.
    #[inline]
    pub fn is_expired(&self, now: u64) -> bool {
        self.flags.test(EntryFlags::EXPIRE_STAMP) && self.expire_stamp <= now
    }

    /// Whether the entry's last update is at or before `idle_floor`.
    #[inline]
    pub fn idle_since(&self, idle_floor: u64) -> bool {
        self.flags.test(EntryFlags::UPDATE_STAMP) && self.update_stamp <= idle_floor
    }
}
