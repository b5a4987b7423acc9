//! TTL expiration during sweep cycles

mod common;

use std::sync::Arc;

use oxisweep::sweep::SweepEngine;
use oxisweep::value::ValueKind;

use common::{fast_config, make_table, oversized_list, store, SECOND_NS};

#[test]
fn elapsed_entries_are_dropped() {
    let table = make_table(64);
    let now = table.current_stamp();
    table.upsert_immediate(b"stale", b"v");
    table.set_expire(b"stale", now - 1);
    table.upsert_immediate(b"fresh", b"v");
    table.set_expire(b"fresh", now + 60 * SECOND_NS);
    table.upsert_immediate(b"forever", b"v");

    let mut engine = SweepEngine::new(Arc::clone(&table), fast_config()).unwrap();
    engine.run_cycle();

    assert!(table.lookup(b"stale").is_none());
    assert!(table.lookup(b"fresh").is_some());
    assert!(table.lookup(b"forever").is_some());
    assert_eq!(engine.stats().snapshot().entries_expired, 1);
}

#[test]
fn expiry_fires_once_the_clock_catches_up() {
    let table = make_table(64);
    let now = table.current_stamp();
    table.upsert_immediate(b"key", b"v");
    table.set_expire(b"key", now + 5 * SECOND_NS);

    let mut engine = SweepEngine::new(Arc::clone(&table), fast_config()).unwrap();
    engine.run_cycle();
    assert!(table.lookup(b"key").is_some());

    table.set_current_stamp(now + 5 * SECOND_NS);
    engine.run_cycle();
    assert!(table.lookup(b"key").is_none());
    assert_eq!(engine.stats().snapshot().entries_expired, 1);
}

#[test]
fn expiring_a_segment_value_releases_its_segment() {
    let table = make_table(64);
    let now = table.current_stamp();
    store(&table, b"mylist", ValueKind::List, oversized_list(8).into_bytes());
    table.set_expire(b"mylist", now - 1);
    assert_eq!(table.allocator().live_segments(), 1);

    let mut engine = SweepEngine::new(Arc::clone(&table), fast_config()).unwrap();
    engine.run_cycle();

    assert!(table.lookup(b"mylist").is_none());
    assert_eq!(table.allocator().live_segments(), 0);
    // Expired entries never reach compaction.
    assert_eq!(engine.stats().snapshot().values_compacted, 0);
}

#[test]
fn dropped_slots_stay_dropped_across_cycles() {
    let table = make_table(64);
    let now = table.current_stamp();
    table.upsert_immediate(b"key", b"v");
    table.set_expire(b"key", now - 1);

    let mut engine = SweepEngine::new(Arc::clone(&table), fast_config()).unwrap();
    engine.run_cycle();
    engine.run_cycle();
    engine.run_cycle();

    // The drop happened exactly once; later visits skip the empty slot.
    assert_eq!(engine.stats().snapshot().entries_expired, 1);
    assert!(table.lookup(b"key").is_none());
}

#[test]
fn rewriting_an_expired_key_clears_the_ttl() {
    let table = make_table(64);
    let now = table.current_stamp();
    table.upsert_immediate(b"key", b"v1");
    table.set_expire(b"key", now + SECOND_NS);

    // The rewrite replaces the entry, TTL included.
    table.upsert_immediate(b"key", b"v2");
    table.set_current_stamp(now + 2 * SECOND_NS);

    let mut engine = SweepEngine::new(Arc::clone(&table), fast_config()).unwrap();
    engine.run_cycle();

    assert!(table.lookup(b"key").is_some());
    assert_eq!(engine.stats().snapshot().entries_expired, 0);
}
