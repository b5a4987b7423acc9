//! Shared helpers for integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use oxisweep::sweep::SweepConfig;
use oxisweep::table::{SweepTable, TableGeometry};
use oxisweep::value::{HashValue, ListValue, SetValue, ValueKind, ZSetValue};

/// One second of logical clock, in nanoseconds.
pub const SECOND_NS: u64 = 1_000_000_000;

pub fn make_table(size: u64) -> Arc<SweepTable> {
    let table = Arc::new(
        SweepTable::new(TableGeometry {
            table_size: size,
            max_value_size: 4 * 1024 * 1024,
        })
        .unwrap(),
    );
    table.set_current_stamp(100 * SECOND_NS);
    table
}

/// Config with short enough intervals that a cycle is a handful of ticks,
/// and no compaction hysteresis.
pub fn fast_config() -> SweepConfig {
    SweepConfig::default()
        .with_scan_cycle(Duration::from_millis(10))
        .with_tick_interval(Duration::from_millis(1))
        .with_hysteresis(Duration::ZERO)
}

/// A list packed with `elems` short elements inside a deliberately oversized
/// buffer.
pub fn oversized_list(elems: usize) -> ListValue {
    let mut list = ListValue::with_capacity((elems.max(1) * 4) as u32, 8192);
    for i in 0..elems {
        list.push(format!("item-{i:04}").as_bytes()).unwrap();
    }
    list
}

pub fn oversized_hash(pairs: usize) -> HashValue {
    let mut hash = HashValue::with_capacity((pairs.max(1) * 4) as u32, 8192);
    for i in 0..pairs {
        hash.push_field(format!("field-{i}").as_bytes(), format!("value-{i}").as_bytes())
            .unwrap();
    }
    hash
}

pub fn oversized_set(members: usize) -> SetValue {
    let mut set = SetValue::with_capacity((members.max(1) * 4) as u32, 8192);
    for i in 0..members {
        set.insert(format!("member-{i}").as_bytes()).unwrap();
    }
    set
}

pub fn oversized_zset(members: usize) -> ZSetValue {
    let mut zset = ZSetValue::with_capacity((members.max(1) * 4) as u32, 8192);
    for i in 0..members {
        zset.insert(i as f64 * 1.5, format!("scored-{i}").as_bytes())
            .unwrap();
    }
    zset
}

/// Store a composite value and return its slot position.
pub fn store(table: &SweepTable, key: &[u8], kind: ValueKind, payload: Vec<u8>) -> u64 {
    assert!(table.upsert_segment(key, kind, payload).is_ok());
    table.position_of(key).unwrap()
}
