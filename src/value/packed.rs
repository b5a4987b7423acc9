//! Shared packed layout for composite values
//!
//! Every composite kind (list/hash/set/sorted-set) stores its elements in one
//! self-describing byte range:
//!
//! ```text
//! +--------+---------------------+----------------------+
//! | header | offset index        | cell data            |
//! | 24 B   | index_cap * 4 B     | data_cap B           |
//! +--------+---------------------+----------------------+
//! ```
//!
//! A cell is a 4-byte little-endian length followed by its payload; the index
//! holds each live cell's offset into the data region. `used size` is the
//! minimum buffer that still holds the live contents: header + one index word
//! per live cell + the live cell bytes. The capacities never shrink in place;
//! shrinking happens by copying into a freshly sized buffer.

use bytemuck::{Pod, Zeroable};

use crate::value::ValueKind;

/// Magic tag at the head of every packed value.
pub const PACKED_MAGIC: u16 = 0x9D4C;

/// Size of the packed header in bytes.
pub const HEADER_SIZE: usize = std::mem::size_of::<PackedHeader>();

/// Width of one index entry.
const INDEX_ENTRY: usize = 4;

/// Width of a cell's length prefix.
const CELL_PREFIX: usize = 4;

/// On-disk-style header of a packed composite value.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct PackedHeader {
    /// Must equal [`PACKED_MAGIC`]
    pub magic: u16,
    /// [`ValueKind`] discriminant
    pub kind: u8,
    /// Reserved
    pub reserved: u8,
    /// Number of live cells
    pub count: u32,
    /// Bytes of the data region in use (length prefixes included)
    pub data_len: u32,
    /// Index capacity, in entries
    pub index_cap: u32,
    /// Data region capacity, in bytes
    pub data_cap: u32,
    /// Reserved
    pub pad: u32,
}

/// Errors raised by the composite value codecs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Header magic does not match.
    #[error("bad value magic: {0:#06x}")]
    BadMagic(u16),
    /// Stored kind tag differs from the expected kind.
    #[error("value kind mismatch: expected {expected}, found tag {found}")]
    KindMismatch {
        /// Kind the caller asked to open.
        expected: ValueKind,
        /// Raw kind tag found in the header.
        found: u8,
    },
    /// Buffer is shorter than the layout the header declares.
    #[error("value truncated: need {need} bytes, have {have}")]
    Truncated {
        /// Bytes the declared layout requires.
        need: usize,
        /// Bytes actually present.
        have: usize,
    },
    /// An index entry points outside the data region.
    #[error("corrupt cell index at {index}")]
    CorruptIndex {
        /// Index of the bad cell.
        index: usize,
    },
    /// Builder capacity (index or data) exhausted.
    #[error("value capacity exceeded")]
    CapacityExceeded,
    /// Copy destination smaller than the used size.
    #[error("destination too small: need {need} bytes, have {have}")]
    DestinationTooSmall {
        /// Bytes required.
        need: usize,
        /// Bytes available.
        have: usize,
    },
}

/// A packed composite value over an owned byte buffer.
///
/// The buffer is either a copy of a slot's stored value (opened read-only by
/// the sweeper) or a fresh builder created with [`PackedValue::with_capacity`].
#[derive(Debug, Clone)]
pub struct PackedValue {
    bytes: Vec<u8>,
}

impl PackedValue {
    /// Build an empty value with room for `index_cap` cells and `data_cap`
    /// bytes of cell data.
    pub fn with_capacity(kind: ValueKind, index_cap: u32, data_cap: u32) -> Self {
        let total = HEADER_SIZE + index_cap as usize * INDEX_ENTRY + data_cap as usize;
        let mut bytes = vec![0u8; total];
        let header = PackedHeader {
            magic: PACKED_MAGIC,
            kind: kind as u8,
            reserved: 0,
            count: 0,
            data_len: 0,
            index_cap,
            data_cap,
            pad: 0,
        };
        bytes[..HEADER_SIZE].copy_from_slice(bytemuck::bytes_of(&header));
        Self { bytes }
    }

    /// Open an existing value, verifying magic, kind, and declared bounds.
    pub fn open(kind: ValueKind, bytes: Vec<u8>) -> Result<Self, CodecError> {
        if bytes.len() < HEADER_SIZE {
            return Err(CodecError::Truncated {
                need: HEADER_SIZE,
                have: bytes.len(),
            });
        }
        let header: PackedHeader = bytemuck::pod_read_unaligned(&bytes[..HEADER_SIZE]);
        if header.magic != PACKED_MAGIC {
            return Err(CodecError::BadMagic(header.magic));
        }
        if header.kind != kind as u8 {
            return Err(CodecError::KindMismatch {
                expected: kind,
                found: header.kind,
            });
        }
        let need = HEADER_SIZE + header.index_cap as usize * INDEX_ENTRY + header.data_cap as usize;
        if bytes.len() < need || header.count > header.index_cap || header.data_len > header.data_cap
        {
            return Err(CodecError::Truncated {
                need,
                have: bytes.len(),
            });
        }
        let value = Self { bytes };
        // Validate every live cell up front so later accessors cannot run
        // past the data region.
        for i in 0..value.count() {
            value.cell(i).ok_or(CodecError::CorruptIndex { index: i })?;
        }
        Ok(value)
    }

    #[inline]
    fn header(&self) -> PackedHeader {
        bytemuck::pod_read_unaligned(&self.bytes[..HEADER_SIZE])
    }

    fn set_header(&mut self, header: PackedHeader) {
        self.bytes[..HEADER_SIZE].copy_from_slice(bytemuck::bytes_of(&header));
    }

    /// Stored kind tag.
    pub fn kind_tag(&self) -> u8 {
        self.header().kind
    }

    /// Number of live cells.
    #[inline]
    pub fn count(&self) -> usize {
        self.header().count as usize
    }

    /// Bytes of the data region in use.
    #[inline]
    pub fn data_len(&self) -> usize {
        self.header().data_len as usize
    }

    /// Total size of the backing buffer (the allocated size).
    #[inline]
    pub fn allocated_size(&self) -> usize {
        self.bytes.len()
    }

    /// Minimum bytes needed to hold the current logical contents.
    #[inline]
    pub fn used_size(&self) -> usize {
        let header = self.header();
        HEADER_SIZE + header.count as usize * INDEX_ENTRY + header.data_len as usize
    }

    fn index_offset(&self, i: usize) -> usize {
        HEADER_SIZE + i * INDEX_ENTRY
    }

    fn data_start(&self) -> usize {
        HEADER_SIZE + self.header().index_cap as usize * INDEX_ENTRY
    }

    fn read_u32(&self, at: usize) -> u32 {
        u32::from_le_bytes(self.bytes[at..at + 4].try_into().expect("4 bytes"))
    }

    fn write_u32(&mut self, at: usize, v: u32) {
        self.bytes[at..at + 4].copy_from_slice(&v.to_le_bytes());
    }

    /// Payload of cell `i`, or `None` when out of range or corrupt.
    pub fn cell(&self, i: usize) -> Option<&[u8]> {
        if i >= self.count() {
            return None;
        }
        let data_start = self.data_start();
        let data_cap = self.header().data_cap as usize;
        let offset = self.read_u32(self.index_offset(i)) as usize;
        if offset + CELL_PREFIX > data_cap {
            return None;
        }
        let len = self.read_u32(data_start + offset) as usize;
        let payload_start = offset + CELL_PREFIX;
        if payload_start + len > data_cap {
            return None;
        }
        Some(&self.bytes[data_start + payload_start..data_start + payload_start + len])
    }

    /// Iterate over live cell payloads in insertion order.
    pub fn cells(&self) -> impl Iterator<Item = &[u8]> {
        (0..self.count()).filter_map(move |i| self.cell(i))
    }

    /// Append one cell. Fails when either capacity is exhausted.
    pub fn push_cell(&mut self, payload: &[u8]) -> Result<(), CodecError> {
        let mut header = self.header();
        let needed = CELL_PREFIX + payload.len();
        if header.count >= header.index_cap
            || header.data_len as usize + needed > header.data_cap as usize
        {
            return Err(CodecError::CapacityExceeded);
        }
        let offset = header.data_len;
        let data_start = self.data_start();
        let index_at = self.index_offset(header.count as usize);
        self.write_u32(index_at, offset);
        self.write_u32(data_start + offset as usize, payload.len() as u32);
        let payload_at = data_start + offset as usize + CELL_PREFIX;
        self.bytes[payload_at..payload_at + payload.len()].copy_from_slice(payload);

        header.count += 1;
        header.data_len += needed as u32;
        self.set_header(header);
        Ok(())
    }

    /// Repack the live contents into `dst` with capacities trimmed to exactly
    /// the used size. Cell order and payload bytes are preserved.
    pub fn copy_into(&self, dst: &mut [u8]) -> Result<(), CodecError> {
        let used = self.used_size();
        if dst.len() < used {
            return Err(CodecError::DestinationTooSmall {
                need: used,
                have: dst.len(),
            });
        }
        let count = self.count() as u32;
        let header = PackedHeader {
            magic: PACKED_MAGIC,
            kind: self.header().kind,
            reserved: 0,
            count,
            data_len: self.data_len() as u32,
            index_cap: count,
            data_cap: self.data_len() as u32,
            pad: 0,
        };
        dst[..HEADER_SIZE].copy_from_slice(bytemuck::bytes_of(&header));

        let dst_data_start = HEADER_SIZE + count as usize * INDEX_ENTRY;
        let mut write_off = 0usize;
        for (i, payload) in self.cells().enumerate() {
            let index_at = HEADER_SIZE + i * INDEX_ENTRY;
            dst[index_at..index_at + 4].copy_from_slice(&(write_off as u32).to_le_bytes());
            let cell_at = dst_data_start + write_off;
            dst[cell_at..cell_at + 4].copy_from_slice(&(payload.len() as u32).to_le_bytes());
            dst[cell_at + CELL_PREFIX..cell_at + CELL_PREFIX + payload.len()]
                .copy_from_slice(payload);
            write_off += CELL_PREFIX + payload.len();
        }
        Ok(())
    }

    /// Consume the value, returning its backing buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Borrow the backing buffer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PackedValue {
        let mut v = PackedValue::with_capacity(ValueKind::List, 8, 256);
        v.push_cell(b"alpha").unwrap();
        v.push_cell(b"beta").unwrap();
        v.push_cell(b"").unwrap();
        v
    }

    #[test]
    fn test_push_and_read() {
        let v = sample();
        assert_eq!(v.count(), 3);
        assert_eq!(v.cell(0), Some(&b"alpha"[..]));
        assert_eq!(v.cell(1), Some(&b"beta"[..]));
        assert_eq!(v.cell(2), Some(&b""[..]));
        assert_eq!(v.cell(3), None);
    }

    #[test]
    fn test_used_vs_allocated() {
        let v = sample();
        let expected_used = HEADER_SIZE + 3 * 4 + (4 + 5) + (4 + 4) + 4;
        assert_eq!(v.used_size(), expected_used);
        assert_eq!(v.allocated_size(), HEADER_SIZE + 8 * 4 + 256);
        assert!(v.used_size() < v.allocated_size());
    }

    #[test]
    fn test_open_roundtrip() {
        let v = sample();
        let reopened = PackedValue::open(ValueKind::List, v.clone().into_bytes()).unwrap();
        assert_eq!(reopened.count(), 3);
        assert_eq!(reopened.cell(1), Some(&b"beta"[..]));
    }

    #[test]
    fn test_open_rejects_bad_magic() {
        let mut bytes = sample().into_bytes();
        bytes[0] = 0;
        assert!(matches!(
            PackedValue::open(ValueKind::List, bytes),
            Err(CodecError::BadMagic(_))
        ));
    }

    #[test]
    fn test_open_rejects_kind_mismatch() {
        let bytes = sample().into_bytes();
        assert!(matches!(
            PackedValue::open(ValueKind::Hash, bytes),
            Err(CodecError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_open_rejects_truncated() {
        let bytes = sample().into_bytes();
        let short = bytes[..HEADER_SIZE + 2].to_vec();
        assert!(matches!(
            PackedValue::open(ValueKind::List, short),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn test_capacity_limits() {
        let mut v = PackedValue::with_capacity(ValueKind::List, 1, 16);
        v.push_cell(b"ok").unwrap();
        assert_eq!(v.push_cell(b"x"), Err(CodecError::CapacityExceeded));

        let mut v = PackedValue::with_capacity(ValueKind::List, 4, 8);
        v.push_cell(b"1234").unwrap(); // 4 prefix + 4 payload fills the region
        assert_eq!(v.push_cell(b""), Err(CodecError::CapacityExceeded));
    }

    #[test]
    fn test_copy_into_compacts_exactly() {
        let v = sample();
        let used = v.used_size();
        let mut dst = vec![0u8; used];
        v.copy_into(&mut dst).unwrap();

        let compacted = PackedValue::open(ValueKind::List, dst).unwrap();
        assert_eq!(compacted.allocated_size(), used);
        assert_eq!(compacted.used_size(), used);
        assert_eq!(compacted.count(), v.count());
        for i in 0..v.count() {
            assert_eq!(compacted.cell(i), v.cell(i));
        }
    }

    #[test]
    fn test_copy_into_too_small() {
        let v = sample();
        let mut dst = vec![0u8; v.used_size() - 1];
        assert!(matches!(
            v.copy_into(&mut dst),
            Err(CodecError::DestinationTooSmall { .. })
        ));
    }

    #[test]
    fn test_header_layout() {
        assert_eq!(HEADER_SIZE, 24);
    }
}
