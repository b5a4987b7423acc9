//! Standalone sweep daemon
//!
//! Hosts a table and runs the sweeper against it, advancing the logical
//! clock and logging stats periodically until interrupted. Configuration
//! comes from a TOML file plus `OXISWEEP__*` environment overrides; command
//! line flags win over both.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use oxisweep::config::OxisweepConfig;
use oxisweep::sweep::SweepWorker;
use oxisweep::table::SweepTable;

#[derive(Debug, Parser)]
#[command(name = "oxisweep-server", about = "hash table sweep daemon", version)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Number of table slots
    #[arg(long)]
    table_size: Option<u64>,

    /// Largest value segment in kibibytes
    #[arg(long)]
    max_value_kb: Option<u64>,

    /// Seconds per full sweep of the table
    #[arg(long)]
    scan_secs: Option<u64>,

    /// Microseconds between sweep ticks
    #[arg(long)]
    tick_micros: Option<u64>,

    /// Idle seconds before a value is compaction-eligible
    #[arg(long)]
    hysteresis_secs: Option<u64>,

    /// Seconds between stats log lines
    #[arg(long, default_value_t = 10)]
    stats_secs: u64,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn load_config(&self) -> Result<OxisweepConfig, oxisweep::config::ConfigError> {
        let mut config = match &self.config {
            Some(path) => OxisweepConfig::load_from_path(path)?,
            None => OxisweepConfig::load_from_env()?,
        };
        if let Some(size) = self.table_size {
            config.table.size = size;
        }
        if let Some(kb) = self.max_value_kb {
            config.table.max_value_kb = kb;
        }
        if let Some(secs) = self.scan_secs {
            config.sweep.scan_secs = secs;
        }
        if let Some(micros) = self.tick_micros {
            config.sweep.tick_micros = micros;
        }
        if let Some(secs) = self.hysteresis_secs {
            config.sweep.hysteresis_secs = secs;
        }
        Ok(config)
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "oxisweep=debug,info",
        _ => "oxisweep=trace,debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = args.load_config()?;
    let geometry = config.to_geometry();
    let sweep_config = config.to_sweep_config();

    let table = Arc::new(SweepTable::new(geometry)?);
    table.update_current_stamp();

    let mut worker = SweepWorker::create(Arc::clone(&table), sweep_config)?;
    worker.start();
    tracing::info!(
        slots = geometry.table_size,
        max_value = geometry.max_value_size,
        scan_secs = config.sweep.scan_secs,
        tick_us = config.sweep.tick_micros,
        "sweeping"
    );

    let stats = worker.stats();
    let mut clock = tokio::time::interval(Duration::from_millis(100));
    let mut report = tokio::time::interval(Duration::from_secs(args.stats_secs.max(1)));
    report.tick().await; // the first tick fires immediately
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = clock.tick() => table.update_current_stamp(),
            _ = report.tick() => {
                let snap = stats.snapshot();
                tracing::info!(
                    %snap,
                    live_segments = table.allocator().live_segments(),
                    "sweep stats"
                );
            }
            _ = &mut ctrl_c => break,
        }
    }

    tracing::info!("shutting down");
    worker.stop();
    let snap = stats.snapshot();
    tracing::info!(%snap, "final stats");
    Ok(())
}
