//! Collaborator interfaces consumed and fed by the watchdog.
//!
//! The watchdog owns no hardware. Register access, link state and rate
//! control all live behind these traits so the controllers can be driven by
//! a real driver, the simulator in [`crate::sim`], or a scripted test double.

use crate::constants::MAX_RX_ANTENNAS;
use crate::error::RadioIoError;
use crate::types::VendorKind;

/// One RSSI read: the combined value plus one entry per RX path.
///
/// Entries beyond the configured antenna count are ignored. A value of 0
/// means the path produced no sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RssiReading {
    pub aggregate: i32,
    pub per_antenna: [i32; MAX_RX_ANTENNAS],
}

/// Raw, monotonic false-alarm counters as kept by the baseband.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FalseAlarmCounters {
    pub ofdm: u32,
    pub cck: u32,
}

/// Raw, monotonic traffic byte counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrafficCounters {
    pub tx_bytes: u64,
    pub rx_bytes: u64,
}

/// Register-level access to the PHY/MAC.
///
/// Reads never block: implementations return the latest value they have.
/// Writes fail fast instead of retrying.
pub trait RadioIo {
    fn read_rssi(&mut self) -> RssiReading;

    fn read_false_alarm_counters(&mut self) -> FalseAlarmCounters;

    /// Thermal meter value; see [`TxPowerConfig`](crate::config::TxPowerConfig) for the sane range.
    fn read_thermal(&mut self) -> i32;

    /// Retries in the interval since the previous call.
    fn read_retry_count(&mut self) -> u32;

    fn read_traffic_counters(&mut self) -> TrafficCounters;

    /// Whether the current TX rate is a CCK rate.
    fn current_rate_is_cck(&mut self) -> bool;

    fn write_register(&mut self, addr: u32, value: u32) -> Result<(), RadioIoError>;

    fn select_antenna(&mut self, index: u8) -> Result<(), RadioIoError>;
}

/// Association state supplied by the link layer.
pub trait LinkState {
    fn is_connected(&self) -> bool;

    /// Vendor of the associated peer, from beacon/association parsing.
    fn detected_peer_vendor(&self) -> VendorKind;

    fn is_scanning(&self) -> bool {
        false
    }
}

/// Coarse rate class derived from smoothed RSSI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RateTier {
    Low,
    Middle,
    High,
}

/// Receiver of rate adaptation hints.
pub trait RateControl {
    /// Called once per tick with the interval's retries and the smoothed RSSI.
    fn on_rate_hint(&mut self, retry_count: u32, rssi: i32);

    /// Called when the smoothed RSSI crosses into a different tier.
    fn on_rate_tier_changed(&mut self, _tier: RateTier) {}
}
