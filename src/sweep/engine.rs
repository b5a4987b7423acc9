//! Tick-driven scan engine
//!
//! The engine owns the scan cursor and the per-tick slot budget. The budget
//! is fixed at construction so a full pass over the table takes roughly the
//! configured cycle time regardless of table size:
//!
//! ```text
//! slots_per_tick = table_size / (scan_cycle / tick_interval) + 1
//! ```
//!
//! Each tick walks its run with a prefetch window [`PREFETCH_SLOTS`] ahead of
//! the inspection point, except on the final run of a cycle where the window
//! would cross the end of the table.

use std::sync::Arc;
use std::time::Instant;

use crate::constants::PREFETCH_SLOTS;
use crate::sweep::inspect::check_slot;
use crate::sweep::stats::SweepStats;
use crate::sweep::{SweepConfig, SweepError};
use crate::table::SweepTable;
use crate::util::prefetch_read;

/// Incremental sweeper over one table. Call [`on_timer`](Self::on_timer)
/// once per tick.
pub struct SweepEngine {
    table: Arc<SweepTable>,
    stats: Arc<SweepStats>,
    scan_pos: u64,
    scan_cnt: u64,
    hysteresis_ns: u64,
    sweep_time_ns: u64,
    sweep_ticks: u64,
    cycle_start: Instant,
    cycles: u64,
}

impl SweepEngine {
    /// Build an engine for `table` with the given tuning.
    pub fn new(table: Arc<SweepTable>, config: SweepConfig) -> Result<Self, SweepError> {
        config.validate()?;
        let ticks_per_cycle =
            (config.scan_cycle.as_nanos() / config.tick_interval.as_nanos()).max(1) as u64;
        let scan_cnt = table.table_size() / ticks_per_cycle + 1;
        Ok(Self {
            table,
            stats: Arc::new(SweepStats::new()),
            scan_pos: 0,
            scan_cnt,
            hysteresis_ns: config.hysteresis.as_nanos() as u64,
            sweep_time_ns: 0,
            sweep_ticks: 0,
            cycle_start: Instant::now(),
            cycles: 0,
        })
    }

    /// Slot budget per tick.
    #[inline]
    pub fn slots_per_tick(&self) -> u64 {
        self.scan_cnt
    }

    /// Current scan cursor.
    #[inline]
    pub fn scan_pos(&self) -> u64 {
        self.scan_pos
    }

    /// Full passes completed since construction.
    #[inline]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Shared handle to the engine's counters.
    pub fn stats(&self) -> Arc<SweepStats> {
        Arc::clone(&self.stats)
    }

    /// The table this engine sweeps.
    pub fn table(&self) -> &Arc<SweepTable> {
        &self.table
    }

    /// Process one tick: inspect this tick's run of slots, prefetching ahead
    /// of the inspection point. Returns `true` when the tick completed a full
    /// pass over the table.
    pub fn on_timer(&mut self) -> bool {
        let started = Instant::now();
        let ht_size = self.table.table_size();
        let now = self.table.current_stamp();
        let idle_floor = now.saturating_sub(self.hysteresis_ns);

        let mut pos = self.scan_pos;
        let mut end_pos = pos + self.scan_cnt + PREFETCH_SLOTS;
        let mut edge = false;
        if end_pos >= ht_size {
            // Last run of the cycle. When the prefetch window itself would
            // cross the end of the table, skip prefetching entirely.
            end_pos = ht_size;
            edge = pos + PREFETCH_SLOTS > ht_size;
        } else {
            end_pos -= PREFETCH_SLOTS;
        }

        if !edge {
            for k in 0..PREFETCH_SLOTS - 1 {
                prefetch_read(self.table.slot_ptr(pos + k));
            }
            while pos + PREFETCH_SLOTS < end_pos {
                prefetch_read(self.table.slot_ptr(pos + PREFETCH_SLOTS));
                check_slot(&self.table, pos, now, idle_floor, &self.stats);
                pos += 1;
            }
        }
        while pos < end_pos {
            check_slot(&self.table, pos, now, idle_floor, &self.stats);
            pos += 1;
        }

        self.scan_pos = pos;
        self.sweep_ticks += 1;
        self.sweep_time_ns += started.elapsed().as_nanos() as u64;
        SweepStats::incr(&self.stats.ticks);

        if pos < ht_size {
            return false;
        }
        self.finish_cycle(ht_size);
        true
    }

    fn finish_cycle(&mut self, ht_size: u64) {
        self.cycles += 1;
        SweepStats::incr(&self.stats.cycles_completed);

        if tracing::enabled!(tracing::Level::DEBUG) {
            let wall_ns = self.cycle_start.elapsed().as_nanos() as u64;
            let avg_ns = self.sweep_time_ns / self.sweep_ticks.max(1);
            let busy_pct = if wall_ns > 0 {
                self.sweep_time_ns as f64 * 100.0 / wall_ns as f64
            } else {
                0.0
            };
            tracing::debug!(
                cycle = self.cycles,
                slots = ht_size,
                ticks = self.sweep_ticks,
                avg_tick_ns = avg_ns,
                wall_ms = wall_ns / 1_000_000,
                busy_pct,
                "sweep cycle complete"
            );
        }

        self.scan_pos = 0;
        self.sweep_time_ns = 0;
        self.sweep_ticks = 0;
        self.cycle_start = Instant::now();
    }

    /// Drive ticks until one full pass completes. Test and maintenance
    /// helper; production callers tick from a timer instead.
    pub fn run_cycle(&mut self) {
        while !self.on_timer() {}
    }
}

impl std::fmt::Debug for SweepEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SweepEngine")
            .field("scan_pos", &self.scan_pos)
            .field("scan_cnt", &self.scan_cnt)
            .field("cycles", &self.cycles)
            .finish()
    }
}
