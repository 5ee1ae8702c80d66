//! Deterministic radio simulator.
//!
//! Stands in for a real driver: [`SimulatedRadio`] produces noisy RSSI,
//! drifting thermal readings, false alarms and traffic from a seeded RNG and
//! records every register write. [`Simulation`] wires it to a
//! [`DmController`] with a [`MockClock`] and steps one watchdog period at a
//! time, so a given seed always produces the same run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::prelude::*;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DmConfig;
use crate::constants::{
    DEFAULT_WATCHDOG_PERIOD_MS, MAX_RX_ANTENNAS, RSSI_MAX_VALID, RSSI_MIN_VALID,
};
use crate::error::{DmError, RadioIoError};
use crate::time::mock_clock::MockClock;
use crate::traits::{
    FalseAlarmCounters, LinkState, RadioIo, RateControl, RateTier, RssiReading, TrafficCounters,
};
use crate::types::VendorKind;
use crate::watchdog::{DmController, TickReport};

/// Parameters of a simulated environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub seed: u64,
    /// Tick (1-based) at which the link associates.
    pub connect_at_tick: u64,
    /// Mean RSSI of the best antenna.
    pub base_rssi: i32,
    /// Per-antenna offsets from `base_rssi`.
    pub antenna_offsets: [i32; MAX_RX_ANTENNAS],
    /// Uniform noise amplitude added to every RSSI sample.
    pub rssi_jitter: i32,
    /// Probability that an RSSI sample is missing.
    pub rssi_dropout_probability: f64,
    pub thermal_start: f64,
    pub thermal_drift_per_tick: f64,
    pub mean_false_alarms: u32,
    /// Probability of a false-alarm burst on a tick.
    pub false_alarm_burst_probability: f64,
    pub tx_bytes_per_tick: u64,
    pub rx_bytes_per_tick: u64,
    pub scan_probability: f64,
    pub write_failure_probability: f64,
    pub peer_vendor: VendorKind,
    pub watchdog_period_ms: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            connect_at_tick: 2,
            base_rssi: 55,
            antenna_offsets: [0, -6, -12, -12],
            rssi_jitter: 4,
            rssi_dropout_probability: 0.02,
            thermal_start: 30.0,
            thermal_drift_per_tick: 0.25,
            mean_false_alarms: 300,
            false_alarm_burst_probability: 0.05,
            tx_bytes_per_tick: 20_000,
            rx_bytes_per_tick: 400_000,
            scan_probability: 0.0,
            write_failure_probability: 0.0,
            peer_vendor: VendorKind::Broadcom,
            watchdog_period_ms: DEFAULT_WATCHDOG_PERIOD_MS,
        }
    }
}

impl SimConfig {
    /// Checks the probabilities and the period.
    ///
    /// # Errors
    /// - [`DmError::InvalidConfig`] - Names the first offending field
    pub fn validate(&self) -> Result<(), DmError> {
        let probabilities = [
            ("rssi_dropout_probability", self.rssi_dropout_probability),
            (
                "false_alarm_burst_probability",
                self.false_alarm_burst_probability,
            ),
            ("scan_probability", self.scan_probability),
            ("write_failure_probability", self.write_failure_probability),
        ];
        for (field, p) in probabilities {
            if !(0.0..=1.0).contains(&p) {
                return Err(DmError::invalid_config(
                    field,
                    format!("{} is not a probability", p),
                ));
            }
        }
        if self.watchdog_period_ms == 0 {
            return Err(DmError::invalid_config(
                "watchdog_period_ms",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Register-level radio model.
#[derive(Debug)]
pub struct SimulatedRadio {
    rng: StdRng,
    config: SimConfig,
    connected: bool,
    thermal: f64,
    false_alarms: FalseAlarmCounters,
    traffic: TrafficCounters,
    retries: u32,
    registers: HashMap<u32, u32>,
    active_antenna: u8,
    writes: u64,
    failed_writes: u64,
}

impl SimulatedRadio {
    pub fn new(config: SimConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            thermal: config.thermal_start,
            connected: false,
            false_alarms: FalseAlarmCounters::default(),
            traffic: TrafficCounters::default(),
            retries: 0,
            registers: HashMap::new(),
            active_antenna: 0,
            writes: 0,
            failed_writes: 0,
            config,
        }
    }

    /// Moves the environment forward by one watchdog period.
    pub fn advance(&mut self, connected: bool) {
        self.connected = connected;
        self.thermal += self.config.thermal_drift_per_tick;

        let mut fa = self.config.mean_false_alarms;
        if self.rng.random_bool(self.config.false_alarm_burst_probability) {
            fa = fa.saturating_mul(5);
        }
        let ofdm = self.rng.random_range(fa / 2..=fa.saturating_add(fa / 2));
        let cck = self.rng.random_range(0..=fa / 4);
        self.false_alarms.ofdm = self.false_alarms.ofdm.wrapping_add(ofdm);
        self.false_alarms.cck = self.false_alarms.cck.wrapping_add(cck);

        if connected {
            self.traffic.tx_bytes = self
                .traffic
                .tx_bytes
                .wrapping_add(self.config.tx_bytes_per_tick);
            self.traffic.rx_bytes = self
                .traffic
                .rx_bytes
                .wrapping_add(self.config.rx_bytes_per_tick);
            self.retries = self.rng.random_range(0..=8);
        } else {
            self.retries = 0;
        }
    }

    /// Last value written to `addr`.
    pub fn register(&self, addr: u32) -> Option<u32> {
        self.registers.get(&addr).copied()
    }

    pub fn active_antenna(&self) -> u8 {
        self.active_antenna
    }

    /// `(successful, failed)` register write counts.
    pub fn write_counts(&self) -> (u64, u64) {
        (self.writes, self.failed_writes)
    }

    fn antenna_sample(&mut self, index: usize) -> i32 {
        if self.rng.random_bool(self.config.rssi_dropout_probability) {
            return 0;
        }
        let jitter = self.config.rssi_jitter.max(0);
        let noise = self.rng.random_range(-jitter..=jitter);
        (self.config.base_rssi + self.config.antenna_offsets[index] + noise)
            .clamp(RSSI_MIN_VALID, RSSI_MAX_VALID)
    }
}

impl RadioIo for SimulatedRadio {
    fn read_rssi(&mut self) -> RssiReading {
        if !self.connected {
            return RssiReading::default();
        }
        let mut per_antenna = [0; MAX_RX_ANTENNAS];
        for (i, slot) in per_antenna.iter_mut().enumerate() {
            *slot = self.antenna_sample(i);
        }
        RssiReading {
            aggregate: per_antenna[self.active_antenna as usize],
            per_antenna,
        }
    }

    fn read_false_alarm_counters(&mut self) -> FalseAlarmCounters {
        self.false_alarms
    }

    fn read_thermal(&mut self) -> i32 {
        self.thermal.round() as i32
    }

    fn read_retry_count(&mut self) -> u32 {
        self.retries
    }

    fn read_traffic_counters(&mut self) -> TrafficCounters {
        self.traffic
    }

    fn current_rate_is_cck(&mut self) -> bool {
        self.connected && self.config.base_rssi < 20
    }

    fn write_register(&mut self, addr: u32, value: u32) -> Result<(), RadioIoError> {
        if self.rng.random_bool(self.config.write_failure_probability) {
            self.failed_writes += 1;
            return Err(RadioIoError::WriteRejected { addr });
        }
        self.writes += 1;
        self.registers.insert(addr, value);
        Ok(())
    }

    fn select_antenna(&mut self, index: u8) -> Result<(), RadioIoError> {
        if index as usize >= MAX_RX_ANTENNAS {
            return Err(RadioIoError::DeviceUnavailable);
        }
        self.active_antenna = index;
        Ok(())
    }
}

/// Link layer model driven by [`Simulation`].
#[derive(Debug, Clone, Default)]
pub struct SimulatedLink {
    pub connected: bool,
    pub scanning: bool,
    pub vendor: VendorKind,
}

impl LinkState for SimulatedLink {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn detected_peer_vendor(&self) -> VendorKind {
        if self.connected {
            self.vendor
        } else {
            VendorKind::Unknown
        }
    }

    fn is_scanning(&self) -> bool {
        self.scanning
    }
}

/// Rate control stub that keeps the last hint and the tier history.
#[derive(Debug, Clone, Default)]
pub struct SimulatedRateControl {
    pub last_hint: Option<(u32, i32)>,
    pub hints: u64,
    pub tier_changes: Vec<RateTier>,
}

impl RateControl for SimulatedRateControl {
    fn on_rate_hint(&mut self, retry_count: u32, rssi: i32) {
        self.last_hint = Some((retry_count, rssi));
        self.hints += 1;
    }

    fn on_rate_tier_changed(&mut self, tier: RateTier) {
        self.tier_changes.push(tier);
    }
}

/// A seeded watchdog run against the simulated collaborators.
#[derive(Debug)]
pub struct Simulation {
    pub radio: SimulatedRadio,
    pub link: SimulatedLink,
    pub rate: SimulatedRateControl,
    controller: DmController,
    clock: Arc<MockClock>,
    events: StdRng,
    config: SimConfig,
    tick: u64,
}

impl Simulation {
    /// Builds a simulation.
    ///
    /// # Errors
    /// - [`DmError::InvalidConfig`] - `config` or `dm_config` failed validation
    pub fn new(config: SimConfig, dm_config: DmConfig) -> Result<Self, DmError> {
        config.validate()?;
        let clock = Arc::new(MockClock::default());
        let controller = DmController::new(dm_config, clock.clone())?;
        Ok(Self {
            radio: SimulatedRadio::new(config.clone()),
            link: SimulatedLink {
                vendor: config.peer_vendor,
                ..SimulatedLink::default()
            },
            rate: SimulatedRateControl::default(),
            controller,
            clock,
            events: StdRng::seed_from_u64(config.seed.rotate_left(17) ^ 0x5EED),
            config,
            tick: 0,
        })
    }

    pub fn controller(&self) -> &DmController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut DmController {
        &mut self.controller
    }

    /// Advances one watchdog period and runs a tick.
    pub fn step(&mut self) -> TickReport {
        self.tick += 1;
        self.clock
            .advance(Duration::from_millis(self.config.watchdog_period_ms));

        let connected = self.tick >= self.config.connect_at_tick;
        self.link.connected = connected;
        self.link.scanning = self.events.random_bool(self.config.scan_probability);
        self.radio.advance(connected);

        let report = self
            .controller
            .run_watchdog_tick(&mut self.radio, &self.link, &mut self.rate);
        debug!(tick = self.tick, status = ?report.status, "simulation step");
        report
    }

    /// Runs `ticks` periods and returns every report.
    pub fn run(&mut self, ticks: u64) -> Vec<TickReport> {
        (0..ticks).map(|_| self.step()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{REG_EDCA_BE_PARAM, REG_OFDM0_XA_AGC_CORE1};
    use crate::watchdog::TickStatus;

    fn quiet() -> SimConfig {
        SimConfig {
            rssi_jitter: 0,
            rssi_dropout_probability: 0.0,
            false_alarm_burst_probability: 0.0,
            thermal_drift_per_tick: 0.0,
            ..SimConfig::default()
        }
    }

    #[test]
    fn same_seed_same_run() {
        let config = SimConfig {
            seed: 42,
            ..SimConfig::default()
        };
        let a = Simulation::new(config.clone(), DmConfig::default())
            .unwrap()
            .run(30);
        let b = Simulation::new(config, DmConfig::default())
            .unwrap()
            .run(30);
        assert_eq!(a, b);
    }

    #[test]
    fn quiet_link_converges_on_mid_band_gain() {
        let mut sim = Simulation::new(quiet(), DmConfig::default()).unwrap();
        let reports = sim.run(12);
        assert!(reports.iter().all(|r| r.failed.is_empty()));
        assert_eq!(sim.radio.register(REG_OFDM0_XA_AGC_CORE1), Some(0x26));
        assert_eq!(
            sim.radio.register(REG_EDCA_BE_PARAM),
            Some(crate::constants::EDCA_DEFAULT_DL_TABLE[VendorKind::Broadcom.table_index()])
        );
        assert!(sim.rate.hints > 0);
    }

    #[test]
    fn rejects_out_of_range_probability() {
        let config = SimConfig {
            scan_probability: 1.5,
            ..SimConfig::default()
        };
        let err = Simulation::new(config, DmConfig::default()).unwrap_err();
        assert!(
            matches!(err, DmError::InvalidConfig { ref field, .. } if field == "scan_probability")
        );
    }

    #[test]
    fn scanning_everywhere_skips_every_tick() {
        let config = SimConfig {
            scan_probability: 1.0,
            ..quiet()
        };
        let mut sim = Simulation::new(config, DmConfig::default()).unwrap();
        for report in sim.run(5) {
            assert!(matches!(report.status, TickStatus::Skipped(_)));
        }
        assert_eq!(sim.radio.write_counts(), (0, 0));
    }
}
