//! RX path (antenna) selection.
//!
//! Every tick each antenna's smoothed score moves towards its latest RSSI
//! sample by `alpha`. A switch needs three things: the active antenna has
//! been held for `min_dwell_ticks`, at least that many samples exist, and the
//! best challenger leads the active antenna by more than the hysteresis
//! margin.

use tracing::{debug, info, warn};

use super::ControlOutcome;
use crate::config::RxPathConfig;
use crate::constants::MAX_RX_ANTENNAS;
use crate::error::{DmError, Sensor};
use crate::stats::RadioStats;
use crate::traits::RadioIo;
use crate::types::AntennaIndex;

/// Persistent antenna selection state.
#[derive(Debug, Clone, PartialEq)]
pub struct AntennaSelectState {
    pub active: AntennaIndex,
    /// Smoothed score per antenna; `None` until the first valid sample.
    pub scores: [Option<f32>; MAX_RX_ANTENNAS],
    /// Ticks since the last switch (or since bring-up).
    pub ticks_since_switch: u32,
    /// Ticks that contributed at least one valid sample.
    pub samples_collected: u32,
    pub hysteresis_margin: f32,
}

/// Owns [`AntennaSelectState`] and performs dwell-limited switching.
#[derive(Debug, Clone)]
pub struct RxPathController {
    config: RxPathConfig,
    antenna_count: usize,
    rssi_min_valid: i32,
    rssi_max_valid: i32,
    state: AntennaSelectState,
}

impl RxPathController {
    /// Creates a controller with antenna 0 active and no history.
    ///
    /// # Parameters
    /// - `config`: Smoothing weight, dwell and margin.
    /// - `antenna_count`: Active RX paths; must not exceed [`MAX_RX_ANTENNAS`].
    /// - `rssi_valid`: Inclusive range of per-antenna samples treated as real.
    pub fn new(config: RxPathConfig, antenna_count: usize, rssi_valid: (i32, i32)) -> Self {
        let state = AntennaSelectState {
            active: AntennaIndex::new(0),
            scores: [None; MAX_RX_ANTENNAS],
            ticks_since_switch: 0,
            samples_collected: 0,
            hysteresis_margin: config.hysteresis_margin,
        };
        Self {
            antenna_count: antenna_count.min(MAX_RX_ANTENNAS),
            rssi_min_valid: rssi_valid.0,
            rssi_max_valid: rssi_valid.1,
            config,
            state,
        }
    }

    pub fn state(&self) -> &AntennaSelectState {
        &self.state
    }

    /// Updates the scores and switches antenna if the rules allow it.
    ///
    /// # Errors
    /// - [`DmError::AntennaSelect`] - The switch failed; the active antenna and the
    ///   dwell counter are left as they were so the next tick retries.
    pub fn run(
        &mut self,
        stats: &RadioStats,
        radio: &mut dyn RadioIo,
    ) -> Result<ControlOutcome, DmError> {
        self.state.ticks_since_switch = self.state.ticks_since_switch.saturating_add(1);
        if !stats.link_connected {
            return Ok(ControlOutcome::Unchanged);
        }

        let mut sampled = false;
        for (i, rssi) in stats.rssi.per_antenna[..self.antenna_count]
            .iter()
            .enumerate()
        {
            if !(self.rssi_min_valid..=self.rssi_max_valid).contains(rssi) {
                continue;
            }
            let sample = *rssi as f32;
            let score = match self.state.scores[i] {
                Some(prev) => self.config.alpha * sample + (1.0 - self.config.alpha) * prev,
                None => sample,
            };
            self.state.scores[i] = Some(score);
            sampled = true;
        }
        if sampled {
            self.state.samples_collected = self.state.samples_collected.saturating_add(1);
        } else {
            let active = self.state.active;
            let value = stats.rssi.per_antenna[active.as_usize()];
            warn!(antenna = %active, rssi = value, "RX path: no valid per-antenna samples");
            return Ok(ControlOutcome::SensorSkipped {
                sensor: Sensor::AntennaRssi(active.value()),
                value,
            });
        }

        let min_dwell = self.config.min_dwell_ticks;
        if self.state.ticks_since_switch < min_dwell || self.state.samples_collected < min_dwell {
            return Ok(ControlOutcome::Unchanged);
        }

        let Some((best, best_score)) = self.best_antenna() else {
            return Ok(ControlOutcome::Unchanged);
        };
        let active = self.state.active;
        if best == active {
            return Ok(ControlOutcome::Unchanged);
        }
        let active_score = self.state.scores[active.as_usize()].unwrap_or(f32::MIN);
        let lead = best_score - active_score;
        if lead <= self.state.hysteresis_margin {
            debug!(
                challenger = %best,
                lead,
                margin = self.state.hysteresis_margin,
                "RX path: challenger lead within margin"
            );
            return Ok(ControlOutcome::Unchanged);
        }

        radio.select_antenna(best.value()).map_err(|source| {
            warn!(antenna = %best, error = %source, "RX path switch failed");
            DmError::AntennaSelect {
                index: best.value(),
                source,
            }
        })?;
        info!(from = %active, to = %best, lead, "RX path switched antenna");
        self.state.active = best;
        self.state.ticks_since_switch = 0;
        Ok(ControlOutcome::Applied)
    }

    // Highest-scoring antenna; ties keep the lower index.
    fn best_antenna(&self) -> Option<(AntennaIndex, f32)> {
        let mut best: Option<(AntennaIndex, f32)> = None;
        for (i, score) in self.state.scores[..self.antenna_count].iter().enumerate() {
            let Some(score) = *score else { continue };
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((AntennaIndex::new(i as u8), score));
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::test_radio::{RecordingRadio, stats_with};

    fn stats_per_antenna(values: [i32; 2]) -> RadioStats {
        let mut stats = stats_with(values[0].max(values[1]), true);
        stats.rssi.per_antenna = [values[0], values[1], 0, 0];
        stats
    }

    fn controller(min_dwell_ticks: u32, hysteresis_margin: f32) -> RxPathController {
        RxPathController::new(
            RxPathConfig {
                alpha: 0.125,
                min_dwell_ticks,
                hysteresis_margin,
            },
            2,
            (1, 100),
        )
    }

    #[test]
    fn first_sample_seeds_score_then_smooths() {
        let mut rx = controller(4, 5.0);
        let mut radio = RecordingRadio::new();
        rx.run(&stats_per_antenna([20, 40]), &mut radio).unwrap();
        assert_eq!(rx.state().scores[0], Some(20.0));
        assert_eq!(rx.state().scores[1], Some(40.0));

        rx.run(&stats_per_antenna([28, 40]), &mut radio).unwrap();
        assert_eq!(rx.state().scores[0], Some(21.0));
    }

    #[test]
    fn switches_once_after_dwell_and_margin() {
        let mut rx = controller(4, 5.0);
        let mut radio = RecordingRadio::new();
        for _ in 0..4 {
            rx.run(&stats_per_antenna([20, 22]), &mut radio).unwrap();
        }
        assert!(radio.antenna_selects.is_empty());

        let mut switches = 0;
        for _ in 0..4 {
            if rx.run(&stats_per_antenna([20, 40]), &mut radio).unwrap()
                == ControlOutcome::Applied
            {
                switches += 1;
            }
        }
        assert_eq!(switches, 1);
        assert_eq!(radio.antenna_selects, vec![1]);
        assert_eq!(rx.state().active, AntennaIndex::new(1));
    }

    #[test]
    fn bootstrap_guard_blocks_early_switch() {
        let mut rx = controller(3, 1.0);
        let mut radio = RecordingRadio::new();
        rx.run(&stats_per_antenna([10, 90]), &mut radio).unwrap();
        rx.run(&stats_per_antenna([10, 90]), &mut radio).unwrap();
        assert!(radio.antenna_selects.is_empty());
        assert_eq!(
            rx.run(&stats_per_antenna([10, 90]), &mut radio).unwrap(),
            ControlOutcome::Applied
        );
    }

    #[test]
    fn invalid_samples_do_not_move_scores() {
        let mut rx = controller(1, 1.0);
        let mut radio = RecordingRadio::new();
        rx.run(&stats_per_antenna([30, 30]), &mut radio).unwrap();
        let outcome = rx.run(&stats_per_antenna([0, 0]), &mut radio).unwrap();
        assert_eq!(
            outcome,
            ControlOutcome::SensorSkipped {
                sensor: Sensor::AntennaRssi(0),
                value: 0
            }
        );
        assert_eq!(rx.state().scores, [Some(30.0), Some(30.0), None, None]);
        assert_eq!(rx.state().samples_collected, 1);
    }

    #[test]
    fn failed_switch_keeps_active_antenna_and_retries() {
        let mut rx = controller(1, 1.0);
        let mut radio = RecordingRadio::new();
        radio.fail_antenna_select = true;
        let err = rx.run(&stats_per_antenna([10, 90]), &mut radio).unwrap_err();
        assert!(matches!(err, DmError::AntennaSelect { index: 1, .. }));
        assert_eq!(rx.state().active, AntennaIndex::new(0));

        radio.fail_antenna_select = false;
        assert_eq!(
            rx.run(&stats_per_antenna([10, 90]), &mut radio).unwrap(),
            ControlOutcome::Applied
        );
        assert_eq!(radio.antenna_selects, vec![1]);
    }

    #[test]
    fn disconnected_link_keeps_scores() {
        let mut rx = controller(1, 1.0);
        let mut radio = RecordingRadio::new();
        rx.run(&stats_per_antenna([30, 30]), &mut radio).unwrap();
        let outcome = rx.run(&stats_with(0, false), &mut radio).unwrap();
        assert_eq!(outcome, ControlOutcome::Unchanged);
        assert_eq!(rx.state().samples_collected, 1);
    }

    #[test]
    fn ignores_antennas_beyond_configured_count() {
        let mut rx = controller(1, 1.0);
        let mut radio = RecordingRadio::new();
        let mut stats = stats_per_antenna([30, 30]);
        stats.rssi.per_antenna[2] = 99;
        rx.run(&stats, &mut radio).unwrap();
        assert_eq!(rx.state().scores[2], None);
        assert!(radio.antenna_selects.is_empty());
    }
}
