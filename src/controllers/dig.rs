//! Dynamic Initial Gain (DIG) controller.
//!
//! Keeps the receiver initial gain (IGI) matched to the link RSSI without
//! oscillating. The controller is a three-state machine:
//!
//! - `Disabled`: no register writes.
//! - `Connected`: aggregate RSSI is classified into one of five bands and the
//!   band's table gain is applied when it differs from the current gain by
//!   more than `min_step`.
//! - `Disconnected`: no peer to calibrate against, so the gain drifts back
//!   towards a sensitive default inside a wider clamp range.
//!
//! In both active states a false-alarm burst lowers the gain by one step,
//! independent of the band table. Every change arms a backoff counter that
//! blocks the next change for `backoff_ticks` ticks.

use tracing::{debug, info, warn};

use super::ControlOutcome;
use crate::config::{DigConfig, GainBounds};
use crate::constants::agc_core_register;
use crate::error::{DmError, Sensor};
use crate::stats::RadioStats;
use crate::traits::RadioIo;
use crate::types::{Component, InitialGain};

/// Operating state of the DIG state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigMode {
    Disabled,
    Connected,
    /// State at bring-up, before any link information is known.
    #[default]
    Disconnected,
}

/// RSSI band used to look up target gain and detection thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum RssiBand {
    #[default]
    VeryLow,
    Low,
    Mid,
    High,
    VeryHigh,
}

impl RssiBand {
    /// Classifies `rssi` against four ascending upper band edges.
    pub fn classify(rssi: i32, breakpoints: &[i32; 4]) -> RssiBand {
        match breakpoints.iter().position(|edge| rssi < *edge) {
            Some(0) => RssiBand::VeryLow,
            Some(1) => RssiBand::Low,
            Some(2) => RssiBand::Mid,
            Some(_) => RssiBand::High,
            None => RssiBand::VeryHigh,
        }
    }

    /// Position of this band in the per-band tables.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Persistent DIG state. Read-only outside this module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigState {
    pub mode: DigMode,
    /// Gain last written successfully to the hardware.
    pub current_gain: InitialGain,
    /// Clamp range of the current mode.
    pub bounds: GainBounds,
    /// Ticks remaining before another gain change is allowed.
    pub backoff: u32,
    /// Band of the latest valid RSSI sample.
    pub band: RssiBand,
    pub enabled: bool,
    /// Set when a gain write reached only some paths; every path is rewritten
    /// on the next allowed tick.
    pub paths_out_of_sync: bool,
}

/// Owns [`DigState`] and applies the DIG rules once per tick.
#[derive(Debug, Clone)]
pub struct DigController {
    config: DigConfig,
    state: DigState,
    rx_paths: u8,
}

impl DigController {
    /// Creates a controller in the `Disconnected` state with the disconnected default gain.
    ///
    /// The hardware is assumed to hold that gain after bring-up.
    pub fn new(config: DigConfig, rx_paths: u8, enabled: bool) -> Self {
        let state = DigState {
            mode: if enabled {
                DigMode::Disconnected
            } else {
                DigMode::Disabled
            },
            current_gain: InitialGain::new(config.disconnected_gain),
            bounds: config.disconnected_bounds,
            backoff: 0,
            band: RssiBand::VeryLow,
            enabled,
            paths_out_of_sync: false,
        };
        Self {
            config,
            state,
            rx_paths,
        }
    }

    pub fn state(&self) -> &DigState {
        &self.state
    }

    /// Turns the controller on or off.
    ///
    /// Disabling enters `Disabled` immediately. Re-enabling takes effect on
    /// the next tick, which re-derives the mode from the link state.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.state.enabled = enabled;
        if !enabled && self.state.mode != DigMode::Disabled {
            info!(gain = %self.state.current_gain, "DIG disabled");
            self.state.mode = DigMode::Disabled;
        }
    }

    /// Runs one DIG step.
    ///
    /// # Errors
    /// - [`DmError::RegisterWrite`] - A gain write failed; the previous gain stays current
    ///   and the backoff stays unarmed so the next tick retries.
    pub fn run(
        &mut self,
        stats: &RadioStats,
        radio: &mut dyn RadioIo,
    ) -> Result<ControlOutcome, DmError> {
        if !self.state.enabled {
            if self.state.mode != DigMode::Disabled {
                info!(gain = %self.state.current_gain, "DIG disabled");
                self.state.mode = DigMode::Disabled;
            }
            return Ok(ControlOutcome::Unchanged);
        }

        let desired_mode = if stats.link_connected {
            DigMode::Connected
        } else {
            DigMode::Disconnected
        };
        if self.state.mode != desired_mode {
            info!(from = ?self.state.mode, to = ?desired_mode, "DIG mode transition");
            self.state.mode = desired_mode;
            self.state.bounds = match desired_mode {
                DigMode::Connected => self.config.connected_bounds,
                _ => self.config.disconnected_bounds,
            };
            // No stale hysteresis across a connectivity change.
            self.state.backoff = 0;
        } else if self.state.backoff > 0 {
            self.state.backoff -= 1;
        }

        let rssi = stats.rssi.aggregate;
        let rssi_valid = (self.config.rssi_min_valid..=self.config.rssi_max_valid).contains(&rssi);
        if desired_mode == DigMode::Connected && rssi_valid {
            self.state.band = RssiBand::classify(rssi, &self.config.band_breakpoints);
            debug!(rssi, band = ?self.state.band, "DIG RSSI band");
        }

        let false_alarm_burst = stats.false_alarm_total() > self.config.false_alarm_threshold;
        let idle_outcome = if desired_mode == DigMode::Connected && !rssi_valid {
            warn!(rssi, "DIG ignoring invalid RSSI sample");
            ControlOutcome::SensorSkipped {
                sensor: Sensor::AggregateRssi,
                value: rssi,
            }
        } else {
            ControlOutcome::Unchanged
        };

        if self.state.backoff > 0 {
            debug!(backoff = self.state.backoff, "DIG holding gain during backoff");
            return Ok(idle_outcome);
        }

        let current = self.state.current_gain;
        let bounds = self.state.bounds;
        let target = if false_alarm_burst {
            let reduced = InitialGain::new(current.saturating_sub(self.config.false_alarm_step));
            debug!(
                false_alarms = stats.false_alarm_total(),
                "DIG false-alarm correction"
            );
            Some(bounds.clamp(reduced))
        } else {
            match desired_mode {
                DigMode::Connected if rssi_valid => {
                    let table_gain = bounds.clamp(InitialGain::new(
                        self.config.gain_table[self.state.band.index()],
                    ));
                    let distance = table_gain.distance_from(current).unsigned_abs();
                    if distance > self.config.min_step as u16 || !bounds.contains(current) {
                        Some(table_gain)
                    } else {
                        None
                    }
                }
                DigMode::Connected => None,
                _ => {
                    let default_gain = InitialGain::new(self.config.disconnected_gain);
                    Some(bounds.clamp(
                        current.step_towards(default_gain, self.config.disconnected_nudge_step),
                    ))
                }
            }
        };

        match target {
            Some(gain) if gain != current => {
                self.apply_gain(gain, radio)?;
                Ok(ControlOutcome::Applied)
            }
            _ if self.state.paths_out_of_sync => {
                debug!(gain = %current, "DIG resyncing gain on every path");
                self.apply_gain(current, radio)?;
                Ok(ControlOutcome::Applied)
            }
            _ => Ok(idle_outcome),
        }
    }

    fn apply_gain(&mut self, gain: InitialGain, radio: &mut dyn RadioIo) -> Result<(), DmError> {
        for path in 0..self.rx_paths {
            let addr = agc_core_register(path);
            radio
                .write_register(addr, gain.value() as u32)
                .map_err(|source| {
                    warn!(%gain, addr, error = %source, "DIG gain write failed");
                    if path > 0 {
                        self.state.paths_out_of_sync = true;
                    }
                    DmError::RegisterWrite {
                        component: Component::Dig,
                        addr,
                        value: gain.value() as u32,
                        source,
                    }
                })?;
        }
        info!(
            from = %self.state.current_gain,
            to = %gain,
            mode = ?self.state.mode,
            band = ?self.state.band,
            "DIG initial gain updated"
        );
        self.state.current_gain = gain;
        self.state.paths_out_of_sync = false;
        self.state.backoff = self.config.backoff_ticks;
        Ok(())
    }
}
