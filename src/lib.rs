//! oxisweep - incremental GC/compaction sweeper for a shared in-memory hash table
//!
//! A fixed-size hash table is mutated concurrently by many parties. The sweeper
//! walks every slot in small, bounded increments driven by a periodic timer:
//!
//! - entries whose time-to-live has elapsed are expired
//! - segment-backed composite values (list/hash/set/sorted-set) whose logical
//!   size has shrunk well below their allocation are compacted in place
//! - everything else gets an approximate-LRU recency mark
//!
//! No path ever blocks on a contended slot. Every mutation runs the optimistic
//! protocol: read, re-acquire, validate identity (hash pair + serial), then
//! commit or abandon. A slot lost to contention is simply revisited on the
//! next cycle.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use oxisweep::prelude::*;
//!
//! let table = Arc::new(SweepTable::new(TableGeometry::default())?);
//! let mut worker = SweepWorker::create(Arc::clone(&table), SweepConfig::default())?;
//! worker.start();
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod status;
pub mod sweep;
pub mod table;
pub mod value;
mod util;

// Re-exports for convenience
pub use status::SlotStatus;
pub use sweep::{SweepConfig, SweepEngine, SweepWorker};
pub use table::{SweepTable, TableGeometry};

/// Constants used throughout the library
pub mod constants {
    /// Size of a cache line in bytes
    pub const CACHE_LINE_BYTES: usize = 64;

    /// Number of slots prefetched ahead of the inspection point
    pub const PREFETCH_SLOTS: u64 = 16;

    /// Default sweep timer period in microseconds
    pub const SWEEP_TIMER_USECS: u64 = 300;

    /// Default idle window before a segment value is compaction-eligible
    pub const HYSTERESIS_SECS: u64 = 10;

    /// Longest key stored inline in the slot record
    pub const MAX_IMMEDIATE_KEY: usize = 32;
}

/// Prelude module for common imports
pub mod prelude {
    pub use crate::config::OxisweepConfig;
    pub use crate::status::SlotStatus;
    pub use crate::sweep::{SweepConfig, SweepEngine, SweepStats, SweepWorker};
    pub use crate::table::{SweepTable, TableGeometry};
    pub use crate::value::{CompositeValue, ValueKind};
}
