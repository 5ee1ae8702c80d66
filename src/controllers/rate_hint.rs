//! Rate-adaptive hinting.
//!
//! Forwards the interval's retry count and the smoothed RSSI to the rate
//! control collaborator every tick, and tracks a coarse [`RateTier`] with
//! separate up/down thresholds so tier notifications do not chatter.

use tracing::{debug, info};

use super::ControlOutcome;
use crate::config::RateHintConfig;
use crate::error::{DmError, Sensor};
use crate::stats::RadioStats;
use crate::traits::{RateControl, RateTier};

/// Persistent rate hint state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateHintState {
    /// Tier last reported; `None` while disconnected.
    pub tier: Option<RateTier>,
    /// `(retry_count, rssi)` of the last hint sent.
    pub last_hint: Option<(u32, i32)>,
}

#[derive(Debug, Clone)]
pub struct RateHintController {
    config: RateHintConfig,
    state: RateHintState,
}

impl RateHintController {
    pub fn new(config: RateHintConfig) -> Self {
        Self {
            config,
            state: RateHintState::default(),
        }
    }

    pub fn state(&self) -> &RateHintState {
        &self.state
    }

    /// Sends this tick's hint and reports a tier change if one happened.
    ///
    /// Returns `Applied` when a tier change was reported.
    pub fn run(
        &mut self,
        stats: &RadioStats,
        rate: &mut dyn RateControl,
    ) -> Result<ControlOutcome, DmError> {
        if !stats.link_connected {
            self.state.tier = None;
            return Ok(ControlOutcome::Unchanged);
        }
        let Some(rssi) = stats.smoothed_rssi else {
            debug!("rate hint skipped: no valid RSSI in window");
            return Ok(ControlOutcome::SensorSkipped {
                sensor: Sensor::AggregateRssi,
                value: stats.rssi.aggregate,
            });
        };

        rate.on_rate_hint(stats.retry_count, rssi);
        self.state.last_hint = Some((stats.retry_count, rssi));

        let next = self.next_tier(rssi);
        if self.state.tier == Some(next) {
            return Ok(ControlOutcome::Unchanged);
        }
        info!(from = ?self.state.tier, to = ?next, rssi, "rate tier changed");
        self.state.tier = Some(next);
        rate.on_rate_tier_changed(next);
        Ok(ControlOutcome::Applied)
    }

    fn next_tier(&self, rssi: i32) -> RateTier {
        let c = &self.config;
        let fresh = || {
            if rssi >= c.high_up {
                RateTier::High
            } else if rssi >= c.low_up {
                RateTier::Middle
            } else {
                RateTier::Low
            }
        };
        match self.state.tier {
            None => fresh(),
            Some(RateTier::High) if rssi >= c.high_down => RateTier::High,
            Some(RateTier::High) | Some(RateTier::Middle) => {
                if rssi >= c.high_up {
                    RateTier::High
                } else if rssi >= c.low_down {
                    RateTier::Middle
                } else {
                    RateTier::Low
                }
            }
            Some(RateTier::Low) => fresh(),
        }
    }
}
