//! EDCA turbo: vendor-keyed best-effort contention parameters.
//!
//! Some access points misbehave with the standard BE parameters. The
//! controller picks an entry from the downlink or uplink table, indexed by
//! the detected peer vendor, according to which direction dominates the
//! traffic of the last interval. Idle links and disconnected links fall back
//! to the default parameter set.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::ControlOutcome;
use crate::config::EdcaConfig;
use crate::constants::REG_EDCA_BE_PARAM;
use crate::error::DmError;
use crate::stats::RadioStats;
use crate::time::Clock;
use crate::traits::RadioIo;
use crate::types::{Component, VendorKind};

/// Dominant traffic direction over the last interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficDirection {
    Idle,
    Downlink,
    Uplink,
}

/// Identifies one EDCA parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdcaSetId {
    Default,
    Downlink(VendorKind),
    Uplink(VendorKind),
}

/// Persistent EDCA state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EdcaState {
    pub peer_vendor: VendorKind,
    /// Set currently programmed; `None` until the first successful write.
    pub applied_id: Option<EdcaSetId>,
    pub applied_value: Option<u32>,
    pub last_applied_at: Option<Instant>,
}

#[derive(Debug, Clone)]
pub struct EdcaController {
    config: EdcaConfig,
    state: EdcaState,
    clock: Arc<dyn Clock>,
}

impl EdcaController {
    pub fn new(config: EdcaConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            state: EdcaState::default(),
            clock,
        }
    }

    pub fn state(&self) -> &EdcaState {
        &self.state
    }

    /// Classifies the interval's traffic by byte counts.
    pub fn classify_traffic(&self, tx_bytes: u64, rx_bytes: u64) -> TrafficDirection {
        let floor = self.config.idle_floor_bytes;
        if tx_bytes < floor && rx_bytes < floor {
            TrafficDirection::Idle
        } else if tx_bytes > rx_bytes.saturating_mul(self.config.uplink_ratio) {
            TrafficDirection::Uplink
        } else {
            TrafficDirection::Downlink
        }
    }

    /// Parameter set and register value for a vendor and direction.
    pub fn select(&self, vendor: VendorKind, direction: TrafficDirection) -> (EdcaSetId, u32) {
        match direction {
            TrafficDirection::Idle => (EdcaSetId::Default, self.config.default_be_param),
            TrafficDirection::Downlink => (
                EdcaSetId::Downlink(vendor),
                self.config.downlink[vendor.table_index()],
            ),
            TrafficDirection::Uplink => (
                EdcaSetId::Uplink(vendor),
                self.config.uplink[vendor.table_index()],
            ),
        }
    }

    /// Programs the set matching this tick's vendor and traffic, if it changed.
    ///
    /// # Errors
    /// - [`DmError::RegisterWrite`] - The set stays unapplied and the next tick retries.
    pub fn run(
        &mut self,
        stats: &RadioStats,
        radio: &mut dyn RadioIo,
    ) -> Result<ControlOutcome, DmError> {
        if stats.peer_vendor != self.state.peer_vendor {
            debug!(
                from = ?self.state.peer_vendor,
                to = ?stats.peer_vendor,
                "EDCA peer vendor changed"
            );
            self.state.peer_vendor = stats.peer_vendor;
        }

        let direction = if stats.link_connected {
            self.classify_traffic(stats.tx_bytes, stats.rx_bytes)
        } else {
            TrafficDirection::Idle
        };
        let (set_id, value) = self.select(self.state.peer_vendor, direction);
        if self.state.applied_id == Some(set_id) {
            return Ok(ControlOutcome::Unchanged);
        }

        let now = self.clock.now();
        if let Some(last) = self.state.last_applied_at {
            let min_interval = Duration::from_millis(self.config.min_switch_interval_ms);
            if now.saturating_duration_since(last) < min_interval {
                debug!(?set_id, "EDCA switch held by minimum interval");
                return Ok(ControlOutcome::Unchanged);
            }
        }

        if self.state.applied_value == Some(value) {
            // Same register contents under a different identity.
            self.state.applied_id = Some(set_id);
            return Ok(ControlOutcome::Unchanged);
        }

        radio
            .write_register(REG_EDCA_BE_PARAM, value)
            .map_err(|source| {
                warn!(?set_id, value, error = %source, "EDCA parameter write failed");
                DmError::RegisterWrite {
                    component: Component::Edca,
                    addr: REG_EDCA_BE_PARAM,
                    value,
                    source,
                }
            })?;
        info!(?set_id, value = format_args!("0x{:08X}", value), "EDCA parameters applied");
        self.state.applied_id = Some(set_id);
        self.state.applied_value = Some(value);
        self.state.last_applied_at = Some(now);
        Ok(ControlOutcome::Applied)
    }
}
