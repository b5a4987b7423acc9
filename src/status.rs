//! Status codes for slot operations
//!
//! Every per-slot operation resolves to one of these compact codes. None of
//! them is fatal to the sweeper: contention and identity mismatches are
//! abandoned and the slot is revisited on a later cycle.

use std::fmt;

/// Outcome of a slot operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SlotStatus {
    /// Operation completed successfully
    #[default]
    Ok = 0,
    /// Slot is held by another party; abandoned without retrying
    Busy = 1,
    /// No entry with the requested key
    NotFound = 2,
    /// Slot is logically empty
    Dropped = 3,
    /// Entry's expiration stamp has elapsed
    Expired = 4,
    /// Identity (hash pair + serial) changed between read and commit
    Mutated = 5,
    /// Value's used size is not below its allocation; nothing to shrink
    NoShrink = 6,
    /// Segment allocator could not satisfy the request
    AllocFailed = 7,
    /// Position is outside the table
    OutOfRange = 8,
}

impl SlotStatus {
    /// Check if the status indicates success
    #[inline]
    pub const fn is_ok(&self) -> bool {
        matches!(self, SlotStatus::Ok)
    }

    /// Check if the slot was contended
    #[inline]
    pub const fn is_busy(&self) -> bool {
        matches!(self, SlotStatus::Busy)
    }

    /// Check if the operation was abandoned due to concurrent interference
    #[inline]
    pub const fn is_abandoned(&self) -> bool {
        matches!(self, SlotStatus::Busy | SlotStatus::Mutated)
    }

    /// Get the status as a string
    pub const fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Ok => "Ok",
            SlotStatus::Busy => "Busy",
            SlotStatus::NotFound => "NotFound",
            SlotStatus::Dropped => "Dropped",
            SlotStatus::Expired => "Expired",
            SlotStatus::Mutated => "Mutated",
            SlotStatus::NoShrink => "NoShrink",
            SlotStatus::AllocFailed => "AllocFailed",
            SlotStatus::OutOfRange => "OutOfRange",
        }
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
