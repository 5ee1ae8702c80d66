//! `wlan-dm-sim`: runs the DM watchdog against the deterministic simulator.
//!
//! ```bash
//! wlan-dm-sim --ticks 120 --seed 7
//! wlan-dm-sim --config dm.json --sim-config env.json --write-failure-probability 0.05
//! RUST_LOG=wlan_dm=debug wlan-dm-sim --ticks 20
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use wlan_dm::sim::{SimConfig, Simulation};
use wlan_dm::{DmConfig, DmError, TickStatus};

#[derive(Parser, Debug)]
#[command(author, version, about = "DM watchdog simulator", long_about = None)]
struct CliArgs {
    /// Number of watchdog ticks to run.
    #[arg(short, long, default_value_t = 60)]
    ticks: u64,

    /// Seed for the simulated environment. Overrides the sim config's seed.
    #[arg(short, long)]
    seed: Option<u64>,

    /// JSON file with watchdog tunables; missing fields keep their defaults.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// JSON file describing the simulated environment.
    #[arg(long, value_name = "FILE")]
    sim_config: Option<PathBuf>,

    /// Mean RSSI of the strongest antenna (1..=100).
    #[arg(long)]
    base_rssi: Option<i32>,

    /// Probability that a register write is rejected.
    #[arg(long)]
    write_failure_probability: Option<f64>,

    /// Probability that a tick falls inside a scan.
    #[arg(long)]
    scan_probability: Option<f64>,

    /// Default log level when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn load_dm_config(path: &Path) -> Result<DmConfig, DmError> {
    let json = fs::read_to_string(path)
        .map_err(|e| DmError::invalid_config("<file>", format!("{}: {}", path.display(), e)))?;
    DmConfig::from_json_str(&json)
}

fn load_sim_config(path: &Path) -> Result<SimConfig, DmError> {
    let json = fs::read_to_string(path)
        .map_err(|e| DmError::invalid_config("<file>", format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&json).map_err(|e| DmError::invalid_config("<document>", e.to_string()))
}

fn run(args: CliArgs) -> Result<(), DmError> {
    let dm_config = match args.config.as_deref() {
        Some(path) => {
            info!(path = %path.display(), "loading watchdog configuration");
            load_dm_config(path)?
        }
        None => DmConfig::default(),
    };
    let mut sim_config = match args.sim_config.as_deref() {
        Some(path) => load_sim_config(path)?,
        None => SimConfig::default(),
    };
    if let Some(seed) = args.seed {
        sim_config.seed = seed;
    }
    if let Some(rssi) = args.base_rssi {
        sim_config.base_rssi = rssi;
    }
    if let Some(p) = args.write_failure_probability {
        sim_config.write_failure_probability = p;
    }
    if let Some(p) = args.scan_probability {
        sim_config.scan_probability = p;
    }

    info!(seed = sim_config.seed, ticks = args.ticks, "starting simulation");
    let mut sim = Simulation::new(sim_config, dm_config)?;

    let mut skipped = 0u64;
    let mut failures = 0u64;
    for _ in 0..args.ticks {
        let report = sim.step();
        match report.status {
            TickStatus::Skipped(reason) => {
                skipped += 1;
                info!(tick = report.tick, %reason, "tick skipped");
            }
            TickStatus::Completed => {
                info!(
                    tick = report.tick,
                    ran = %report.ran,
                    applied = %report.applied,
                    failed = %report.failed,
                    sensor_skipped = %report.sensor_skipped,
                    "tick completed"
                );
            }
        }
        for (component, err) in &report.errors {
            failures += 1;
            warn!(tick = report.tick, %component, error = %err, "controller error");
        }
    }

    let dm = sim.controller();
    let (writes, failed_writes) = sim.radio.write_counts();
    info!(
        gain = %dm.dig_state().current_gain,
        band = ?dm.dig_state().band,
        antenna = %dm.antenna_state().active,
        tx_offset = dm.tx_power_state().applied_offset,
        edca = ?dm.edca_state().applied_id,
        rate_tier = ?dm.rate_hint_state().tier,
        writes,
        failed_writes,
        skipped,
        failures,
        "simulation finished"
    );
    Ok(())
}

fn main() {
    let args = CliArgs::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Err(e) = run(args) {
        error!("{e}");
        process::exit(1);
    }
}
