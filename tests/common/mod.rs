//! Common test utilities for the DM watchdog integration tests.
//!
//! Provides a scripted radio double that records every write and can inject
//! failures, plus link and rate-control doubles and controller builders.

#![allow(dead_code)] // Not every test file uses every helper.

use std::collections::HashSet;
use std::sync::Arc;

use wlan_dm::traits::{FalseAlarmCounters, RssiReading, TrafficCounters};
use wlan_dm::{
    DmConfig, DmController, LinkState, MockClock, RadioIo, RadioIoError, RateControl, RateTier,
    TickReport, VendorKind,
};

/// Radio double driven by the test: every read returns the scripted value.
#[derive(Debug, Clone)]
pub struct ScriptedRadio {
    pub rssi: RssiReading,
    /// Raw cumulative counters, as the hardware would report them.
    pub false_alarms: FalseAlarmCounters,
    pub traffic: TrafficCounters,
    pub thermal: i32,
    pub retries: u32,
    pub cck_rate: bool,
    pub writes: Vec<(u32, u32)>,
    pub antenna_selects: Vec<u8>,
    pub failing_addrs: HashSet<u32>,
    pub fail_all_writes: bool,
    pub fail_antenna_select: bool,
}

impl Default for ScriptedRadio {
    fn default() -> Self {
        Self {
            rssi: RssiReading::default(),
            false_alarms: FalseAlarmCounters::default(),
            traffic: TrafficCounters::default(),
            thermal: 30,
            retries: 0,
            cck_rate: false,
            writes: Vec::new(),
            antenna_selects: Vec::new(),
            failing_addrs: HashSet::new(),
            fail_all_writes: false,
            fail_antenna_select: false,
        }
    }
}

impl ScriptedRadio {
    /// A radio reporting `rssi` on the aggregate and on every antenna.
    pub fn with_rssi(rssi: i32) -> Self {
        let mut radio = Self::default();
        radio.set_rssi(rssi);
        radio
    }

    pub fn set_rssi(&mut self, rssi: i32) {
        self.rssi = RssiReading {
            aggregate: rssi,
            per_antenna: [rssi; 4],
        };
    }

    /// Sets the first two antennas; the aggregate follows the stronger one.
    pub fn set_antenna_rssi(&mut self, a0: i32, a1: i32) {
        self.rssi = RssiReading {
            aggregate: a0.max(a1),
            per_antenna: [a0, a1, 0, 0],
        };
    }

    /// Adds to the cumulative false-alarm counters.
    pub fn add_false_alarms(&mut self, ofdm: u32, cck: u32) {
        self.false_alarms.ofdm = self.false_alarms.ofdm.wrapping_add(ofdm);
        self.false_alarms.cck = self.false_alarms.cck.wrapping_add(cck);
    }

    /// Adds to the cumulative traffic counters.
    pub fn add_traffic(&mut self, tx_bytes: u64, rx_bytes: u64) {
        self.traffic.tx_bytes += tx_bytes;
        self.traffic.rx_bytes += rx_bytes;
    }

    /// Values written to `addr`, oldest first.
    pub fn writes_to(&self, addr: u32) -> Vec<u32> {
        self.writes
            .iter()
            .filter(|(a, _)| *a == addr)
            .map(|(_, v)| *v)
            .collect()
    }

    pub fn write_count(&self) -> usize {
        self.writes.len()
    }
}

impl RadioIo for ScriptedRadio {
    fn read_rssi(&mut self) -> RssiReading {
        self.rssi
    }

    fn read_false_alarm_counters(&mut self) -> FalseAlarmCounters {
        self.false_alarms
    }

    fn read_thermal(&mut self) -> i32 {
        self.thermal
    }

    fn read_retry_count(&mut self) -> u32 {
        self.retries
    }

    fn read_traffic_counters(&mut self) -> TrafficCounters {
        self.traffic
    }

    fn current_rate_is_cck(&mut self) -> bool {
        self.cck_rate
    }

    fn write_register(&mut self, addr: u32, value: u32) -> Result<(), RadioIoError> {
        if self.fail_all_writes || self.failing_addrs.contains(&addr) {
            return Err(RadioIoError::WriteRejected { addr });
        }
        self.writes.push((addr, value));
        Ok(())
    }

    fn select_antenna(&mut self, index: u8) -> Result<(), RadioIoError> {
        if self.fail_antenna_select {
            return Err(RadioIoError::DeviceUnavailable);
        }
        self.antenna_selects.push(index);
        Ok(())
    }
}

/// Link state double.
#[derive(Debug, Clone)]
pub struct TestLink {
    pub connected: bool,
    pub scanning: bool,
    pub vendor: VendorKind,
}

impl TestLink {
    pub fn connected() -> Self {
        Self {
            connected: true,
            scanning: false,
            vendor: VendorKind::Unknown,
        }
    }

    pub fn disconnected() -> Self {
        Self {
            connected: false,
            ..Self::connected()
        }
    }

    pub fn with_vendor(vendor: VendorKind) -> Self {
        Self {
            vendor,
            ..Self::connected()
        }
    }
}

impl LinkState for TestLink {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn detected_peer_vendor(&self) -> VendorKind {
        self.vendor
    }

    fn is_scanning(&self) -> bool {
        self.scanning
    }
}

/// Rate control double recording every callback.
#[derive(Debug, Clone, Default)]
pub struct RecordingRate {
    pub hints: Vec<(u32, i32)>,
    pub tiers: Vec<RateTier>,
}

impl RateControl for RecordingRate {
    fn on_rate_hint(&mut self, retry_count: u32, rssi: i32) {
        self.hints.push((retry_count, rssi));
    }

    fn on_rate_tier_changed(&mut self, tier: RateTier) {
        self.tiers.push(tier);
    }
}

/// Default configuration with the association settle delay removed.
pub fn ready_config() -> DmConfig {
    DmConfig {
        association_settle_ticks: 0,
        ..DmConfig::default()
    }
}

/// Builds a controller on a `MockClock`.
///
/// # Returns
/// The controller and the clock, so tests can move time forward.
pub fn create_test_controller(config: DmConfig) -> (DmController, Arc<MockClock>) {
    let clock = Arc::new(MockClock::default());
    let controller =
        DmController::new(config, clock.clone()).expect("test config must be valid");
    (controller, clock)
}

/// Runs `ticks` ticks with unchanged collaborators.
pub fn run_ticks(
    dm: &mut DmController,
    radio: &mut ScriptedRadio,
    link: &TestLink,
    rate: &mut RecordingRate,
    ticks: usize,
) -> Vec<TickReport> {
    (0..ticks)
        .map(|_| dm.run_watchdog_tick(radio, link, rate))
        .collect()
}
