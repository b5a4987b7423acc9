//! File- and environment-based configuration
//!
//! A TOML file supplies `[table]` and `[sweep]` sections; every field has a
//! default so an empty file (or no file at all) yields a working setup.
//! Environment variables of the form `OXISWEEP__<section>__<field>` override
//! individual fields after the file is read.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::constants::{HYSTERESIS_SECS, SWEEP_TIMER_USECS};
use crate::sweep::SweepConfig;
use crate::table::TableGeometry;

/// Environment variable naming the config file to load.
pub const CONFIG_PATH_ENV: &str = "OXISWEEP_CONFIG";

const ENV_PREFIX: &str = "OXISWEEP__";

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The config file is not valid TOML for this schema.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    /// An environment override holds a value the field cannot parse.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// The override's key, e.g. `OXISWEEP__table__size`.
        key: String,
        /// The rejected value.
        value: String,
    },
}

/// `[table]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TableSection {
    /// Number of slots
    pub size: u64,
    /// Largest value segment, in kibibytes
    pub max_value_kb: u64,
}

impl Default for TableSection {
    fn default() -> Self {
        Self {
            size: 1024,
            max_value_kb: 1024,
        }
    }
}

/// `[sweep]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SweepSection {
    /// Target seconds for one full pass over the table
    pub scan_secs: u64,
    /// Tick period in microseconds
    pub tick_micros: u64,
    /// Idle seconds before a segment value is compaction-eligible
    pub hysteresis_secs: u64,
}

impl Default for SweepSection {
    fn default() -> Self {
        Self {
            scan_secs: 60,
            tick_micros: SWEEP_TIMER_USECS,
            hysteresis_secs: HYSTERESIS_SECS,
        }
    }
}

/// Complete loaded configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct OxisweepConfig {
    /// Table geometry
    pub table: TableSection,
    /// Sweeper tuning
    pub sweep: SweepSection,
}

impl OxisweepConfig {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a file, then apply environment overrides.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&text)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load from the file named by [`CONFIG_PATH_ENV`], or defaults when the
    /// variable is unset. Environment overrides apply either way.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::load_from_path(path),
            Err(_) => {
                let mut config = Self::default();
                config.apply_env_overrides()?;
                Ok(config)
            }
        }
    }

    /// Apply `OXISWEEP__<section>__<field>` overrides from the environment.
    /// Unrecognized keys under the prefix are ignored.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        for (key, value) in std::env::vars() {
            let Some(rest) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let target = match rest {
                "table__size" => &mut self.table.size,
                "table__max_value_kb" => &mut self.table.max_value_kb,
                "sweep__scan_secs" => &mut self.sweep.scan_secs,
                "sweep__tick_micros" => &mut self.sweep.tick_micros,
                "sweep__hysteresis_secs" => &mut self.sweep.hysteresis_secs,
                _ => continue,
            };
            *target = value.parse().map_err(|_| ConfigError::InvalidValue {
                key: key.clone(),
                value,
            })?;
        }
        Ok(())
    }

    /// Table geometry described by the `[table]` section.
    pub fn to_geometry(&self) -> TableGeometry {
        TableGeometry {
            table_size: self.table.size,
            max_value_size: self.table.max_value_kb * 1024,
        }
    }

    /// Sweeper tuning described by the `[sweep]` section.
    pub fn to_sweep_config(&self) -> SweepConfig {
        SweepConfig::default()
            .with_scan_cycle(Duration::from_secs(self.sweep.scan_secs))
            .with_tick_interval(Duration::from_micros(self.sweep.tick_micros))
            .with_hysteresis(Duration::from_secs(self.sweep.hysteresis_secs))
    }
}
