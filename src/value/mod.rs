//! Composite value codecs
//!
//! Four composite kinds share one packed layout and one compaction protocol;
//! only their element encodings differ. The set of kinds is closed and
//! dispatched by the type tag stored in the slot, not by open-ended
//! inheritance.

mod hash;
mod list;
mod packed;
mod set;
mod zset;

pub use hash::HashValue;
pub use list::ListValue;
pub use packed::{CodecError, PackedHeader, PackedValue, HEADER_SIZE, PACKED_MAGIC};
pub use set::SetValue;
pub use zset::ZSetValue;

/// Type tag of a stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ValueKind {
    /// Plain or unknown value; never compacted
    #[default]
    Other = 0,
    /// Ordered list of elements
    List = 1,
    /// Field/value map
    Hash = 2,
    /// Unordered member set
    Set = 3,
    /// Score-ordered member set
    SortedSet = 4,
}

impl ValueKind {
    /// Whether this kind participates in compaction.
    #[inline]
    pub const fn is_composite(&self) -> bool {
        !matches!(self, ValueKind::Other)
    }

    /// Get the kind as a string
    pub const fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Other => "other",
            ValueKind::List => "list",
            ValueKind::Hash => "hash",
            ValueKind::Set => "set",
            ValueKind::SortedSet => "zset",
        }
    }
}

impl From<u8> for ValueKind {
    fn from(value: u8) -> Self {
        match value {
            1 => ValueKind::List,
            2 => ValueKind::Hash,
            3 => ValueKind::Set,
            4 => ValueKind::SortedSet,
            _ => ValueKind::Other,
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Capability shared by every composite kind.
///
/// Compaction needs exactly three things from a value: open it read-only from
/// its current bytes, compute its used size, and copy its logical contents
/// into a smaller buffer. Everything else is kind-specific client API.
pub trait CompositeValue: Sized {
    /// The kind this codec handles.
    const KIND: ValueKind;

    /// Open a value read-only from a copy of its stored bytes.
    fn open(bytes: Vec<u8>) -> Result<Self, CodecError>;

    /// Number of logical elements.
    fn element_count(&self) -> usize;

    /// Minimum bytes needed to hold the current logical contents.
    fn used_size(&self) -> usize;

    /// Size of the backing buffer.
    fn allocated_size(&self) -> usize;

    /// Copy the logical contents into `dst`, trimming capacity to fit.
    fn copy_into(&self, dst: &mut [u8]) -> Result<(), CodecError>;
}
