//! TX power tracking.
//!
//! Compensates thermal drift of the TX power with a calibration cycle that
//! spans several ticks instead of blocking inside one:
//!
//! ```text
//! Idle --(period elapsed)--> Measuring --(thermal read)--> Applying --> Idle
//!                               |
//!                               +--(reading out of range)--> Idle (counter kept)
//! ```
//!
//! An aborted cycle keeps the tick counter, so the next tick starts a new
//! measurement instead of waiting a whole period.

use tracing::{debug, info, warn};

use super::ControlOutcome;
use crate::config::TxPowerConfig;
use crate::constants::REG_TX_AGC_OFFSET;
use crate::error::{DmError, Sensor};
use crate::stats::RadioStats;
use crate::traits::RadioIo;
use crate::types::Component;

/// Phase of the calibration cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxPowerPhase {
    #[default]
    Idle,
    Measuring,
    /// Waiting to write `pending_offset`.
    Applying { pending_offset: i8 },
}

/// Persistent TX power tracking state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TxPowerState {
    pub phase: TxPowerPhase,
    /// Reference thermal value; adopted from the first valid reading if not configured.
    pub thermal_baseline: Option<i32>,
    /// Last valid thermal reading.
    pub last_thermal: Option<i32>,
    /// Offset last written to the hardware, within `[-index_max, index_max]`.
    pub applied_offset: i8,
    pub ticks_since_calibration: u32,
}

impl TxPowerState {
    pub fn calibration_in_progress(&self) -> bool {
        self.phase != TxPowerPhase::Idle
    }
}

/// Owns [`TxPowerState`] and steps the calibration cycle once per tick.
#[derive(Debug, Clone)]
pub struct TxPowerController {
    config: TxPowerConfig,
    state: TxPowerState,
}

impl TxPowerController {
    pub fn new(config: TxPowerConfig) -> Self {
        let state = TxPowerState {
            thermal_baseline: config.thermal_baseline,
            ..TxPowerState::default()
        };
        Self { config, state }
    }

    pub fn state(&self) -> &TxPowerState {
        &self.state
    }

    /// Advances the calibration cycle by one phase.
    ///
    /// # Errors
    /// - [`DmError::RegisterWrite`] - The offset write failed; the cycle stays in
    ///   `Applying` and retries the same offset next tick.
    pub fn run(
        &mut self,
        _stats: &RadioStats,
        radio: &mut dyn RadioIo,
    ) -> Result<ControlOutcome, DmError> {
        self.state.ticks_since_calibration = self.state.ticks_since_calibration.saturating_add(1);

        match self.state.phase {
            TxPowerPhase::Idle => {
                if self.state.ticks_since_calibration >= self.config.calibration_period {
                    debug!(
                        ticks = self.state.ticks_since_calibration,
                        "TX power calibration started"
                    );
                    self.state.phase = TxPowerPhase::Measuring;
                }
                Ok(ControlOutcome::Unchanged)
            }
            TxPowerPhase::Measuring => self.measure(radio),
            TxPowerPhase::Applying { pending_offset } => self.apply(pending_offset, radio),
        }
    }

    fn measure(&mut self, radio: &mut dyn RadioIo) -> Result<ControlOutcome, DmError> {
        let thermal = radio.read_thermal();
        if !(self.config.thermal_min..=self.config.thermal_max).contains(&thermal) {
            warn!(
                thermal,
                min = self.config.thermal_min,
                max = self.config.thermal_max,
                "TX power calibration aborted: thermal reading out of range"
            );
            self.state.phase = TxPowerPhase::Idle;
            return Ok(ControlOutcome::SensorSkipped {
                sensor: Sensor::Thermal,
                value: thermal,
            });
        }

        let baseline = *self.state.thermal_baseline.get_or_insert(thermal);
        self.state.last_thermal = Some(thermal);
        let pending_offset = self.offset_for_delta(thermal.saturating_sub(baseline));
        debug!(
            thermal,
            baseline,
            pending_offset,
            "TX power thermal measured"
        );
        self.state.phase = TxPowerPhase::Applying { pending_offset };
        Ok(ControlOutcome::Unchanged)
    }

    fn apply(
        &mut self,
        pending_offset: i8,
        radio: &mut dyn RadioIo,
    ) -> Result<ControlOutcome, DmError> {
        let mut outcome = ControlOutcome::Unchanged;
        if pending_offset != self.state.applied_offset {
            let value = pending_offset as u8 as u32;
            radio
                .write_register(REG_TX_AGC_OFFSET, value)
                .map_err(|source| {
                    warn!(pending_offset, error = %source, "TX power offset write failed");
                    DmError::RegisterWrite {
                        component: Component::TxPower,
                        addr: REG_TX_AGC_OFFSET,
                        value,
                        source,
                    }
                })?;
            info!(
                from = self.state.applied_offset,
                to = pending_offset,
                "TX power index offset updated"
            );
            self.state.applied_offset = pending_offset;
            outcome = ControlOutcome::Applied;
        }
        self.state.ticks_since_calibration = 0;
        self.state.phase = TxPowerPhase::Idle;
        Ok(outcome)
    }

    /// Maps a thermal delta through the step table and clamps to `±index_max`.
    ///
    /// Deltas beyond the table use its last entry. A positive delta (hotter
    /// than the baseline) raises the index.
    pub fn offset_for_delta(&self, delta: i32) -> i8 {
        let table = &self.config.step_table;
        let Some(last) = table.len().checked_sub(1) else {
            return 0;
        };
        let index = (delta.unsigned_abs() as usize).min(last);
        let magnitude = table[index].clamp(0, self.config.index_max.max(0));
        if delta < 0 { -magnitude } else { magnitude }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::test_radio::{RecordingRadio, stats_with};

    fn controller(period: u32, baseline: Option<i32>) -> TxPowerController {
        TxPowerController::new(TxPowerConfig {
            calibration_period: period,
            thermal_baseline: baseline,
            ..TxPowerConfig::default()
        })
    }

    #[test]
    fn cycle_spans_three_ticks_after_period() {
        let mut tx = controller(2, Some(30));
        let mut radio = RecordingRadio::new();
        radio.thermal = 35;
        let stats = stats_with(50, true);

        tx.run(&stats, &mut radio).unwrap();
        assert_eq!(tx.state().phase, TxPowerPhase::Idle);
        tx.run(&stats, &mut radio).unwrap();
        assert_eq!(tx.state().phase, TxPowerPhase::Measuring);
        assert!(tx.state().calibration_in_progress());

        tx.run(&stats, &mut radio).unwrap();
        assert_eq!(
            tx.state().phase,
            TxPowerPhase::Applying { pending_offset: 2 }
        );
        assert!(radio.writes.is_empty());

        assert_eq!(tx.run(&stats, &mut radio).unwrap(), ControlOutcome::Applied);
        assert_eq!(tx.state().applied_offset, 2);
        assert_eq!(tx.state().ticks_since_calibration, 0);
        assert_eq!(radio.writes_to(REG_TX_AGC_OFFSET), vec![2]);
    }

    #[test]
    fn negative_offsets_are_written_as_twos_complement() {
        let mut tx = controller(1, Some(30));
        let mut radio = RecordingRadio::new();
        radio.thermal = 25;
        let stats = stats_with(50, true);
        for _ in 0..3 {
            tx.run(&stats, &mut radio).unwrap();
        }
        assert_eq!(tx.state().applied_offset, -2);
        assert_eq!(radio.writes_to(REG_TX_AGC_OFFSET), vec![0xFE]);
    }

    #[test]
    fn unchanged_offset_is_not_rewritten() {
        let mut tx = controller(1, None);
        let mut radio = RecordingRadio::new();
        let stats = stats_with(50, true);
        for _ in 0..12 {
            tx.run(&stats, &mut radio).unwrap();
        }
        assert_eq!(tx.state().thermal_baseline, Some(30));
        assert!(radio.writes.is_empty());
    }

    #[test]
    fn out_of_range_thermal_aborts_and_retries_next_tick() {
        let mut tx = controller(3, Some(30));
        let mut radio = RecordingRadio::new();
        radio.thermal = 0;
        let stats = stats_with(50, true);
        for _ in 0..3 {
            tx.run(&stats, &mut radio).unwrap();
        }
        assert_eq!(tx.state().phase, TxPowerPhase::Measuring);

        assert_eq!(
            tx.run(&stats, &mut radio).unwrap(),
            ControlOutcome::SensorSkipped {
                sensor: Sensor::Thermal,
                value: 0
            }
        );
        assert_eq!(tx.state().phase, TxPowerPhase::Idle);
        assert_eq!(tx.state().ticks_since_calibration, 4);
        assert_eq!(tx.state().applied_offset, 0);

        // Counter kept, so the very next tick measures again.
        tx.run(&stats, &mut radio).unwrap();
        assert_eq!(tx.state().phase, TxPowerPhase::Measuring);
    }

    #[test]
    fn write_failure_stays_in_applying() {
        let mut tx = controller(1, Some(30));
        let mut radio = RecordingRadio::new();
        radio.thermal = 40;
        radio.failing_addrs.insert(REG_TX_AGC_OFFSET);
        let stats = stats_with(50, true);
        tx.run(&stats, &mut radio).unwrap();
        tx.run(&stats, &mut radio).unwrap();

        let err = tx.run(&stats, &mut radio).unwrap_err();
        assert!(matches!(
            err,
            DmError::RegisterWrite {
                component: Component::TxPower,
                ..
            }
        ));
        assert_eq!(
            tx.state().phase,
            TxPowerPhase::Applying { pending_offset: 6 }
        );
        assert_eq!(tx.state().applied_offset, 0);

        radio.failing_addrs.clear();
        assert_eq!(tx.run(&stats, &mut radio).unwrap(), ControlOutcome::Applied);
        assert_eq!(tx.state().applied_offset, 6);
    }

    #[test]
    fn offset_for_delta_is_clamped() {
        let mut config = TxPowerConfig::default();
        config.step_table = vec![0, 3, 9, 20];
        config.index_max = 5;
        let tx = TxPowerController::new(config);
        assert_eq!(tx.offset_for_delta(0), 0);
        assert_eq!(tx.offset_for_delta(1), 3);
        assert_eq!(tx.offset_for_delta(-1), -3);
        assert_eq!(tx.offset_for_delta(2), 5);
        assert_eq!(tx.offset_for_delta(i32::MAX), 5);
        assert_eq!(tx.offset_for_delta(i32::MIN), -5);
    }

    #[test]
    fn extreme_thermal_delta_saturates_instead_of_overflowing() {
        let config = TxPowerConfig {
            calibration_period: 1,
            thermal_baseline: Some(-10),
            thermal_min: i32::MIN,
            thermal_max: i32::MAX,
            ..TxPowerConfig::default()
        };
        let dm_config = crate::config::DmConfig {
            tx_power: config.clone(),
            ..crate::config::DmConfig::default()
        };
        assert!(dm_config.validate().is_ok());

        let index_max = config.index_max;
        let mut tx = TxPowerController::new(config);
        let mut radio = RecordingRadio::new();
        let stats = stats_with(50, true);
        radio.thermal = i32::MAX;
        for _ in 0..3 {
            tx.run(&stats, &mut radio).unwrap();
        }
        assert_eq!(tx.state().applied_offset, index_max);

        let mut tx = TxPowerController::new(TxPowerConfig {
            calibration_period: 1,
            thermal_baseline: Some(10),
            thermal_min: i32::MIN,
            thermal_max: i32::MAX,
            ..TxPowerConfig::default()
        });
        radio.thermal = i32::MIN;
        for _ in 0..3 {
            tx.run(&stats, &mut radio).unwrap();
        }
        assert_eq!(tx.state().applied_offset, -index_max);
    }
}
