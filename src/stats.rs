//! Per-tick statistics snapshot.
//!
//! [`StatsSnapshot`] turns the collaborators' raw, monotonic counters into
//! per-interval values and keeps a short window of recent RSSI samples. Each
//! call to [`StatsSnapshot::capture`] yields an immutable [`RadioStats`] that
//! every controller of the tick reads.

use std::collections::VecDeque;

use tracing::debug;

use crate::traits::{FalseAlarmCounters, LinkState, RadioIo, RssiReading, TrafficCounters};
use crate::types::VendorKind;

/// Everything the controllers know about the radio for one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioStats {
    /// Tick sequence number, starting at 1.
    pub tick: u64,
    pub rssi: RssiReading,
    /// Mean of the recent valid aggregate RSSI samples, if any.
    pub smoothed_rssi: Option<i32>,
    /// OFDM false alarms since the previous tick.
    pub ofdm_false_alarms: u32,
    /// CCK false alarms since the previous tick.
    pub cck_false_alarms: u32,
    pub retry_count: u32,
    /// TX bytes since the previous tick.
    pub tx_bytes: u64,
    /// RX bytes since the previous tick.
    pub rx_bytes: u64,
    pub is_cck_rate: bool,
    pub link_connected: bool,
    pub scanning: bool,
    pub peer_vendor: VendorKind,
}

impl RadioStats {
    #[inline]
    pub fn false_alarm_total(&self) -> u32 {
        self.ofdm_false_alarms.saturating_add(self.cck_false_alarms)
    }
}

/// Counter deltas and the rolling RSSI window, carried between ticks.
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    tick: u64,
    previous_false_alarms: Option<FalseAlarmCounters>,
    previous_traffic: Option<TrafficCounters>,
    rssi_window: VecDeque<i32>,
    window_len: usize,
    rssi_min_valid: i32,
    rssi_max_valid: i32,
}

impl StatsSnapshot {
    /// Creates a snapshot with an empty history.
    ///
    /// # Parameters
    /// - `window_len`: Number of aggregate RSSI samples kept for smoothing.
    /// - `rssi_min_valid`, `rssi_max_valid`: Samples outside this range are not recorded.
    pub fn new(window_len: usize, rssi_min_valid: i32, rssi_max_valid: i32) -> Self {
        Self {
            tick: 0,
            previous_false_alarms: None,
            previous_traffic: None,
            rssi_window: VecDeque::with_capacity(window_len),
            window_len: window_len.max(1),
            rssi_min_valid,
            rssi_max_valid,
        }
    }

    /// Reads the collaborators and produces this tick's [`RadioStats`].
    pub fn capture(&mut self, radio: &mut dyn RadioIo, link: &dyn LinkState) -> RadioStats {
        self.tick += 1;

        let link_connected = link.is_connected();
        let rssi = radio.read_rssi();
        let false_alarms = radio.read_false_alarm_counters();
        let traffic = radio.read_traffic_counters();
        let retry_count = radio.read_retry_count();
        let is_cck_rate = radio.current_rate_is_cck();

        let (ofdm_false_alarms, cck_false_alarms) = match self.previous_false_alarms {
            Some(prev) => (
                counter_delta(prev.ofdm as u64, false_alarms.ofdm as u64) as u32,
                counter_delta(prev.cck as u64, false_alarms.cck as u64) as u32,
            ),
            None => (0, 0),
        };
        self.previous_false_alarms = Some(false_alarms);

        let (tx_bytes, rx_bytes) = match self.previous_traffic {
            Some(prev) => (
                counter_delta(prev.tx_bytes, traffic.tx_bytes),
                counter_delta(prev.rx_bytes, traffic.rx_bytes),
            ),
            None => (0, 0),
        };
        self.previous_traffic = Some(traffic);

        if !link_connected {
            // Peer RSSI history is meaningless once the link drops.
            self.rssi_window.clear();
        } else if (self.rssi_min_valid..=self.rssi_max_valid).contains(&rssi.aggregate) {
            if self.rssi_window.len() == self.window_len {
                self.rssi_window.pop_front();
            }
            self.rssi_window.push_back(rssi.aggregate);
        }

        let stats = RadioStats {
            tick: self.tick,
            rssi,
            smoothed_rssi: self.smoothed_rssi(),
            ofdm_false_alarms,
            cck_false_alarms,
            retry_count,
            tx_bytes,
            rx_bytes,
            is_cck_rate,
            link_connected,
            scanning: link.is_scanning(),
            peer_vendor: link.detected_peer_vendor(),
        };
        debug!(
            tick = stats.tick,
            rssi = stats.rssi.aggregate,
            false_alarms = stats.false_alarm_total(),
            connected = stats.link_connected,
            "captured radio statistics"
        );
        stats
    }

    /// Mean of the RSSI window, rounded towards zero.
    pub fn smoothed_rssi(&self) -> Option<i32> {
        if self.rssi_window.is_empty() {
            return None;
        }
        let sum: i64 = self.rssi_window.iter().map(|v| *v as i64).sum();
        Some((sum / self.rssi_window.len() as i64) as i32)
    }

    /// Number of ticks captured so far.
    pub fn ticks(&self) -> u64 {
        self.tick
    }
}

// A counter that went backwards was reset by the hardware; its current value
// is the count since that reset.
fn counter_delta(previous: u64, current: u64) -> u64 {
    if current >= previous {
        current - previous
    } else {
        current
    }
}
