//! List values: an ordered sequence of byte-string elements.

use crate::value::packed::{CodecError, PackedValue};
use crate::value::{CompositeValue, ValueKind};

/// An ordered list of elements over the packed layout. Each cell is one
/// element's raw bytes.
#[derive(Debug, Clone)]
pub struct ListValue {
    inner: PackedValue,
}

impl ListValue {
    /// Build an empty list with room for `index_cap` elements and `data_cap`
    /// bytes of element data.
    pub fn with_capacity(index_cap: u32, data_cap: u32) -> Self {
        Self {
            inner: PackedValue::with_capacity(ValueKind::List, index_cap, data_cap),
        }
    }

    /// Append an element at the tail.
    pub fn push(&mut self, element: &[u8]) -> Result<(), CodecError> {
        self.inner.push_cell(element)
    }

    /// Element at position `i`.
    pub fn get(&self, i: usize) -> Option<&[u8]> {
        self.inner.cell(i)
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.inner.count()
    }

    /// Whether the list has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate elements in order.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.inner.cells()
    }

    /// Consume the list, returning its backing buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.inner.into_bytes()
    }
}

impl CompositeValue for ListValue {
    const KIND: ValueKind = ValueKind::List;

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
