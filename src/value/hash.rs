//! Hash values: a field/value map.
//!
//! Each cell encodes one pair: a 4-byte little-endian field length, the field
//! bytes, then the value bytes.

use crate::value::packed::{CodecError, PackedValue};
use crate::value::{CompositeValue, ValueKind};

/// A field/value map over the packed layout.
#[derive(Debug, Clone)]
pub struct HashValue {
    inner: PackedValue,
}

fn decode_pair(cell: &[u8]) -> Option<(&[u8], &[u8])> {
    if cell.len() < 4 {
        return None;
    }
    let flen = u32::from_le_bytes(cell[..4].try_into().ok()?) as usize;
    if 4 + flen > cell.len() {
        return None;
    }
    Some((&cell[4..4 + flen], &cell[4 + flen..]))
}

impl HashValue {
    /// Build an empty hash with room for `index_cap` pairs and `data_cap`
    /// bytes of pair data.
    pub fn with_capacity(index_cap: u32, data_cap: u32) -> Self {
        Self {
            inner: PackedValue::with_capacity(ValueKind::Hash, index_cap, data_cap),
        }
    }

    /// Append a field/value pair. Duplicate fields are not deduplicated by
    /// the codec; callers own that policy.
    pub fn push_field(&mut self, field: &[u8], value: &[u8]) -> Result<(), CodecError> {
        let mut cell = Vec::with_capacity(4 + field.len() + value.len());
        cell.extend_from_slice(&(field.len() as u32).to_le_bytes());
        cell.extend_from_slice(field);
        cell.extend_from_slice(value);
        self.inner.push_cell(&cell)
    }

    /// Value of `field`, scanning pairs in insertion order.
    pub fn get(&self, field: &[u8]) -> Option<&[u8]> {
        self.iter().find(|(f, _)| *f == field).map(|(_, v)| v)
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.inner.count()
    }

    /// Whether the hash has no pairs.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate pairs in insertion order, skipping undecodable cells.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.inner.cells().filter_map(decode_pair)
    }

    /// Consume the hash, returning its backing buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.inner.into_bytes()
    }
}

impl CompositeValue for HashValue {
    const KIND: ValueKind = ValueKind::Hash;

    fn open(bytes: Vec<u8>) -> Result<Self, CodecError> {
        Ok(Self {
            inner: PackedValue::open(Self::KIND, bytes)?,
        })
    }

    fn element_count(&self) -> usize {
        self.inner.count()
    }

    fn used_size(&self) -> usize {
        self.inner.used_size()
    }

    fn allocated_size(&self) -> usize {
        self.inner.allocated_size()
    }

    fn copy_into(&self, dst: &mut [u8]) -> Result<(), CodecError> {
        self.inner.copy_into(dst)
    }
}
