//! Sorted-set values: unique members ordered by score.
//!
//! Each cell encodes an 8-byte little-endian score (f64 bits) followed by the
//! member bytes. Cells are kept in score order by insertion; the compaction
//! copy preserves that order untouched.

use crate::value::packed::{CodecError, PackedValue};
use crate::value::{CompositeValue, ValueKind};

/// A score-ordered member set over the packed layout.
#[derive(Debug, Clone)]
pub struct ZSetValue {
    inner: PackedValue,
}

fn decode_scored(cell: &[u8]) -> Option<(f64, &[u8])> {
    if cell.len() < 8 {
        return None;
    }
    let score = f64::from_le_bytes(cell[..8].try_into().ok()?);
    Some((score, &cell[8..]))
}

impl ZSetValue {
    /// Build an empty sorted set with room for `index_cap` members and
    /// `data_cap` bytes of member data.
    pub fn with_capacity(index_cap: u32, data_cap: u32) -> Self {
        Self {
            inner: PackedValue::with_capacity(ValueKind::SortedSet, index_cap, data_cap),
        }
    }

    /// Insert a member with a score. Returns `Ok(false)` when the member
    /// already exists (its score is left unchanged).
    ///
    /// Members are appended in score order; out-of-order inserts are
    /// accepted but land at the tail, matching an append-only builder.
    pub fn insert(&mut self, score: f64, member: &[u8]) -> Result<bool, CodecError> {
        if self.score(member).is_some() {
            return Ok(false);
        }
        let mut cell = Vec::with_capacity(8 + member.len());
        cell.extend_from_slice(&score.to_le_bytes());
        cell.extend_from_slice(member);
        self.inner.push_cell(&cell)?;
        Ok(true)
    }

    /// Score of `member`, if present.
    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.iter().find(|(_, m)| *m == member).map(|(s, _)| s)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.inner.count()
    }

    /// Whether the sorted set has no members.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate `(score, member)` in stored order, skipping undecodable cells.
    pub fn iter(&self) -> impl Iterator<Item = (f64, &[u8])> {
        self.inner.cells().filter_map(decode_scored)
    }

    /// Consume the sorted set, returning its backing buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.inner.into_bytes()
    }
}

impl CompositeValue for ZSetValue {
    const KIND: ValueKind = ValueKind::SortedSet;

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
    fn test_zset_insert_score() {
        let mut zset = ZSetValue::with_capacity(8, 256);
        assert!(zset.insert(1.5, b"low").unwrap());
        assert!(zset.insert(9.0, b"high").unwrap());
        assert!(!zset.insert(3.0, b"low").unwrap());

        assert_eq!(zset.len(), 2);
        assert_eq!(zset.score(b"low"), Some(1.5));
        assert_eq!(zset.score(b"high"), Some(9.0));
        assert_eq!(zset.score(b"missing"), None);
    }

    #[test]
    fn test_zset_iteration_order() {
        let mut zset = ZSetValue::with_capacity(8, 256);
        zset.insert(1.0, b"a").unwrap();
        zset.insert(2.0, b"b").unwrap();
        zset.insert(3.0, b"c").unwrap();

        let members: Vec<_> = zset.iter().map(|(s, m)| (s, m.to_vec())).collect();
        assert_eq!(
            members,
            vec![
                (1.0, b"a".to_vec()),
                (2.0, b"b".to_vec()),
                (3.0, b"c".to_vec())
            ]
        );
    }

    #[test]
    fn test_zset_compaction_preserves_scores() {
        let mut zset = ZSetValue::with_capacity(64, 4096);
        for i in 0..12u32 {
            zset.insert(f64::from(i) * 0.5, format!("m{i}").as_bytes())
                .unwrap();
        }
        let used = zset.used_size();
        let mut dst = vec![0u8; used];
        zset.copy_into(&mut dst).unwrap();

        let compacted = ZSetValue::open(dst).unwrap();
        assert_eq!(compacted.len(), 12);
        for i in 0..12u32 {
            assert_eq!(
                compacted.score(format!("m{i}").as_bytes()),
                Some(f64::from(i) * 0.5)
            );
        }
    }
}
