//! The incremental sweeper
//!
//! One full pass over the table is a *cycle*; a cycle is spread over many
//! timer *ticks* so each tick inspects only a small budgeted run of slots.
//! [`SweepEngine`] is the synchronous core (one `on_timer` call per tick,
//! drivable deterministically); [`SweepWorker`] wraps it in a background
//! thread with pause/resume control.

mod compact;
mod engine;
mod inspect;
mod stats;
mod worker;

pub use engine::SweepEngine;
pub use stats::{SweepStats, SweepStatsSnapshot};
pub use worker::SweepWorker;

use std::time::Duration;

use crate::constants::{HYSTERESIS_SECS, SWEEP_TIMER_USECS};

/// Runtime tuning for a sweeper.
#[derive(Debug, Clone, Copy)]
pub struct SweepConfig {
    /// Target wall time for one full pass over the table
    pub scan_cycle: Duration,
    /// Period between ticks
    pub tick_interval: Duration,
    /// Idle window a segment value must sit untouched before it is
    /// compaction-eligible
    pub hysteresis: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            scan_cycle: Duration::from_secs(60),
            tick_interval: Duration::from_micros(SWEEP_TIMER_USECS),
            hysteresis: Duration::from_secs(HYSTERESIS_SECS),
        }
    }
}

impl SweepConfig {
    /// Set the target wall time for one full pass.
    pub fn with_scan_cycle(mut self, scan_cycle: Duration) -> Self {
        self.scan_cycle = scan_cycle;
        self
    }

    /// Set the tick period.
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Set the compaction idle window.
    pub fn with_hysteresis(mut self, hysteresis: Duration) -> Self {
        self.hysteresis = hysteresis;
        self
    }

    /// Check the configuration for internally inconsistent values.
    pub fn validate(&self) -> Result<(), SweepError> {
        if self.tick_interval.is_zero() {
            return Err(SweepError::InvalidConfig {
                reason: "tick_interval must be non-zero",
            });
        }
        if self.scan_cycle.is_zero() {
            return Err(SweepError::InvalidConfig {
                reason: "scan_cycle must be non-zero",
            });
        }
        if self.scan_cycle < self.tick_interval {
            return Err(SweepError::InvalidConfig {
                reason: "scan_cycle must be at least one tick_interval",
            });
        }
        Ok(())
    }
}

/// Errors raised when configuring or starting a sweeper.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    /// Configuration values are out of range or inconsistent.
    #[error("invalid sweep config: {reason}")]
    InvalidConfig {
        /// What was wrong.
        reason: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SweepConfig::default();
        assert_eq!(config.scan_cycle, Duration::from_secs(60));
        assert_eq!(config.tick_interval, Duration::from_micros(300));
        assert_eq!(config.hysteresis, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_chain() {
        let config = SweepConfig::default()
            .with_scan_cycle(Duration::from_secs(5))
            .with_tick_interval(Duration::from_millis(1))
            .with_hysteresis(Duration::from_secs(2));
        assert_eq!(config.scan_cycle, Duration::from_secs(5));
        assert_eq!(config.tick_interval, Duration::from_millis(1));
        assert_eq!(config.hysteresis, Duration::from_secs(2));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_tick = SweepConfig::default().with_tick_interval(Duration::ZERO);
        assert!(zero_tick.validate().is_err());

        let zero_cycle = SweepConfig::default().with_scan_cycle(Duration::ZERO);
        assert!(zero_cycle.validate().is_err());

        let inverted = SweepConfig::default()
            .with_scan_cycle(Duration::from_micros(100))
            .with_tick_interval(Duration::from_micros(300));
        assert!(inverted.validate().is_err());
    }
}
