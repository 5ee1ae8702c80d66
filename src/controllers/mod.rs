//! Sub-controllers invoked once per watchdog tick.
//!
//! Key components:
//! - `dig`: Dynamic Initial Gain, the RSSI/false-alarm driven IGI state machine.
//! - `rx_path`: Smoothed per-antenna scores and dwell-limited antenna switching.
//! - `tx_power`: Multi-tick thermal calibration of the TX power index offset.
//! - `threshold`: Packet-detection and carrier-sense thresholds derived from the DIG band.
//! - `rate_hint`: Retry/RSSI hints and rate tier changes for rate control.
//! - `edca`: Vendor-keyed EDCA best-effort parameter selection.
//!
//! Each controller exclusively owns its persistent state. Cross-controller
//! reads go through shared references handed out by the watchdog.

pub mod dig;
pub mod edca;
pub mod rate_hint;
pub mod rx_path;
pub mod threshold;
pub mod tx_power;

pub use self::dig::{DigController, DigMode, DigState, RssiBand};
pub use self::edca::{EdcaController, EdcaSetId, EdcaState, TrafficDirection};
pub use self::rate_hint::{RateHintController, RateHintState};
pub use self::rx_path::{AntennaSelectState, RxPathController};
pub use self::threshold::{ThresholdController, ThresholdSetting};
pub use self::tx_power::{TxPowerController, TxPowerPhase, TxPowerState};

use crate::error::{DmError, Sensor};

/// What a controller did during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutcome {
    /// Ran, nothing needed to change.
    Unchanged,
    /// Ran and successfully updated the hardware or notified rate control.
    Applied,
    /// A sensor reading was invalid, so the dependent branch was skipped.
    SensorSkipped { sensor: Sensor, value: i32 },
}

impl ControlOutcome {
    /// The matching [`DmError::SensorInvalid`] for a skipped branch.
    pub fn sensor_error(&self) -> Option<DmError> {
        match *self {
            ControlOutcome::SensorSkipped { sensor, value } => {
                Some(DmError::SensorInvalid { sensor, value })
            }
            _ => None,
        }
    }
}
