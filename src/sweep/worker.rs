//! Background sweep thread
//!
//! Wraps a [`SweepEngine`] in a dedicated thread ticking at the configured
//! interval, with pause/resume and clean shutdown. The engine itself stays
//! usable without the worker for embedders that tick from their own event
//! loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::sweep::engine::SweepEngine;
use crate::sweep::stats::SweepStats;
use crate::sweep::{SweepConfig, SweepError};
use crate::table::SweepTable;

/// Owns the sweep thread for one table.
pub struct SweepWorker {
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    stats: Arc<SweepStats>,
    tick_interval: Duration,
    engine: Option<SweepEngine>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SweepWorker {
    /// Build a worker for `table`. The thread is not started yet.
    pub fn create(table: Arc<SweepTable>, config: SweepConfig) -> Result<Self, SweepError> {
        let engine = SweepEngine::new(table, config)?;
        Ok(Self {
            running: Arc::new(AtomicBool::new(false)),
            paused: Arc::new(AtomicBool::new(false)),
            stats: engine.stats(),
            tick_interval: config.tick_interval,
            engine: Some(engine),
            handle: None,
        })
    }

    /// Start the sweep thread. Returns `false` if it is already running.
    pub fn start(&mut self) -> bool {
        let Some(mut engine) = self.engine.take() else {
            return false;
        };
        self.running.store(true, Ordering::Release);

        let running = Arc::clone(&self.running);
        let paused = Arc::clone(&self.paused);
        let tick_interval = self.tick_interval;

        let handle = thread::Builder::new()
            .name("sweep".into())
            .spawn(move || {
                tracing::debug!(
                    slots_per_tick = engine.slots_per_tick(),
                    tick_us = tick_interval.as_micros() as u64,
                    "sweep worker started"
                );
                while running.load(Ordering::Acquire) {
                    if !paused.load(Ordering::Acquire) {
                        engine.on_timer();
                    }
                    thread::sleep(tick_interval);
                }
                tracing::debug!(cycles = engine.cycles(), "sweep worker stopped");
            })
            .expect("failed to spawn sweep thread");
        self.handle = Some(handle);
        true
    }

    /// Whether the sweep thread is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Suspend sweeping without stopping the thread.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Resume after a [`pause`](Self::pause).
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    /// Whether sweeping is currently suspended.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Stop the sweep thread and wait for it to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// Shared handle to the sweeper's counters.
    pub fn stats(&self) -> Arc<SweepStats> {
        Arc::clone(&self.stats)
    }
}

impl Drop for SweepWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TableGeometry;

    fn table() -> Arc<SweepTable> {
        Arc::new(
            SweepTable::new(TableGeometry {
                table_size: 64,
                max_value_size: 1024 * 1024,
            })
            .unwrap(),
        )
    }

    fn fast_config() -> SweepConfig {
        SweepConfig::default()
            .with_scan_cycle(Duration::from_millis(5))
            .with_tick_interval(Duration::from_micros(200))
    }

    #[test]
    fn test_worker_lifecycle() {
        let mut worker = SweepWorker::create(table(), fast_config()).unwrap();
        assert!(!worker.is_running());

        assert!(worker.start());
        assert!(worker.is_running());
        // A second start has no engine left to run.
        assert!(!worker.start());

        worker.stop();
        assert!(!worker.is_running());
    }

    #[test]
    fn test_worker_sweeps_in_background() {
        let t = table();
        t.set_current_stamp(1);
        let mut worker = SweepWorker::create(Arc::clone(&t), fast_config()).unwrap();
        worker.start();

        let stats = worker.stats();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while stats.snapshot().cycles_completed == 0 {
            assert!(std::time::Instant::now() < deadline, "no cycle completed");
            thread::sleep(Duration::from_millis(5));
        }
        worker.stop();
        assert!(stats.snapshot().slots_inspected >= 64);
    }

    #[test]
    fn test_pause_suspends_progress() {
        let mut worker = SweepWorker::create(table(), fast_config()).unwrap();
        worker.pause();
        worker.start();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(worker.stats().snapshot().ticks, 0);

        worker.resume();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while worker.stats().snapshot().ticks == 0 {
            assert!(std::time::Instant::now() < deadline, "no tick after resume");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SweepConfig::default().with_scan_cycle(Duration::ZERO);
        assert!(SweepWorker::create(table(), config).is_err());
    }
}
