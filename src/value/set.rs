//! Set values: unordered unique members.
//!
//! Each cell is one member's raw bytes; uniqueness is enforced on insert by
//! a linear scan, which is the right trade for the small member counts these
//! values hold in practice.

use crate::value::packed::{CodecError, PackedValue};
use crate::value::{CompositeValue, ValueKind};

/// A member set over the packed layout.
#[derive(Debug, Clone)]
pub struct SetValue {
    inner: PackedValue,
}

impl SetValue {
    /// Build an empty set with room for `index_cap` members and `data_cap`
    /// bytes of member data.
    pub fn with_capacity(index_cap: u32, data_cap: u32) -> Self {
        Self {
            inner: PackedValue::with_capacity(ValueKind::Set, index_cap, data_cap),
        }
    }

    /// Insert a member. Returns `Ok(false)` when the member already exists.
    pub fn insert(&mut self, member: &[u8]) -> Result<bool, CodecError> {
        if self.contains(member) {
            return Ok(false);
        }
        self.inner.push_cell(member)?;
        Ok(true)
    }

    /// Whether `member` is present.
    pub fn contains(&self, member: &[u8]) -> bool {
        self.iter().any(|m| m == member)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.inner.count()
    }

    /// Whether the set has no members.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate members in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.inner.cells()
    }

    /// Consume the set, returning its backing buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.inner.into_bytes()
    }
}

impl CompositeValue for SetValue {
    const KIND: ValueKind = ValueKind::Set;

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_insert_contains() {
        let mut set = SetValue::with_capacity(8, 128);
        assert!(set.insert(b"a").unwrap());
        assert!(set.insert(b"b").unwrap());
        assert!(!set.insert(b"a").unwrap());

        assert_eq!(set.len(), 2);
        assert!(set.contains(b"a"));
        assert!(set.contains(b"b"));
        assert!(!set.contains(b"c"));
    }

    #[test]
    fn test_set_compaction_preserves_members() {
        let mut set = SetValue::with_capacity(64, 2048);
        for i in 0..15u32 {
            set.insert(format!("member-{i}").as_bytes()).unwrap();
        }
        let used = set.used_size();
        let mut dst = vec![0u8; used];
        set.copy_into(&mut dst).unwrap();

        let compacted = SetValue::open(dst).unwrap();
        assert_eq!(compacted.len(), 15);
        for i in 0..15u32 {
            assert!(compacted.contains(format!("member-{i}").as_bytes()));
        }
    }
}
