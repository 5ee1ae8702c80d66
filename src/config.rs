//! Tunables for the DM watchdog.
//!
//! Band breakpoints, hysteresis constants and step tables are hardware and
//! firmware specific, so none of them are hardcoded in the controllers. The
//! defaults come from [`crate::constants`] and can be overlaid from JSON:
//! every struct is `#[serde(default)]`, so a file only has to name the
//! values it changes.

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::DmError;
use crate::types::{Component, InitialGain, VendorKind};

/// Complete watchdog configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DmConfig {
    /// Number of RX antenna paths (2..=4).
    pub antenna_count: usize,
    /// Ticks the link must be connected before tuning resumes.
    pub association_settle_ticks: u32,
    pub abilities: DmAbilities,
    pub dig: DigConfig,
    pub rx_path: RxPathConfig,
    pub tx_power: TxPowerConfig,
    pub thresholds: ThresholdConfig,
    pub rate_hint: RateHintConfig,
    pub edca: EdcaConfig,
}

impl Default for DmConfig {
    fn default() -> Self {
        Self {
            antenna_count: DEFAULT_ANTENNA_COUNT,
            association_settle_ticks: DEFAULT_ASSOCIATION_SETTLE_TICKS,
            abilities: DmAbilities::default(),
            dig: DigConfig::default(),
            rx_path: RxPathConfig::default(),
            tx_power: TxPowerConfig::default(),
            thresholds: ThresholdConfig::default(),
            rate_hint: RateHintConfig::default(),
            edca: EdcaConfig::default(),
        }
    }
}

impl DmConfig {
    /// Parses a JSON document and validates the result.
    ///
    /// # Errors
    /// - [`DmError::InvalidConfig`] - Malformed JSON or an unusable value
    pub fn from_json_str(json: &str) -> Result<Self, DmError> {
        let config: DmConfig = serde_json::from_str(json)
            .map_err(|e| DmError::invalid_config("<document>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every section for values the controllers cannot work with.
    ///
    /// # Errors
    /// - [`DmError::InvalidConfig`] - Names the first offending field
    pub fn validate(&self) -> Result<(), DmError> {
        if !(MIN_RX_ANTENNAS..=MAX_RX_ANTENNAS).contains(&self.antenna_count) {
            return Err(DmError::invalid_config(
                "antenna_count",
                format!(
                    "{} outside {}..={}",
                    self.antenna_count, MIN_RX_ANTENNAS, MAX_RX_ANTENNAS
                ),
            ));
        }
        self.dig.validate()?;
        self.rx_path.validate()?;
        self.tx_power.validate()?;
        self.rate_hint.validate()?;
        self.edca.validate()?;
        Ok(())
    }
}

/// Cross-cutting enable flags, one per controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DmAbilities {
    pub dig: bool,
    pub rx_path: bool,
    pub tx_power: bool,
    pub thresholds: bool,
    pub rate_hint: bool,
    pub edca: bool,
}

impl Default for DmAbilities {
    fn default() -> Self {
        Self {
            dig: true,
            rx_path: true,
            tx_power: true,
            thresholds: true,
            rate_hint: true,
            edca: true,
        }
    }
}

impl DmAbilities {
    pub fn is_enabled(&self, component: Component) -> bool {
        match component {
            Component::Dig => self.dig,
            Component::RxPath => self.rx_path,
            Component::TxPower => self.tx_power,
            Component::Thresholds => self.thresholds,
            Component::RateHint => self.rate_hint,
            Component::Edca => self.edca,
        }
    }

    pub fn set(&mut self, component: Component, enabled: bool) {
        let flag = match component {
            Component::Dig => &mut self.dig,
            Component::RxPath => &mut self.rx_path,
            Component::TxPower => &mut self.tx_power,
            Component::Thresholds => &mut self.thresholds,
            Component::RateHint => &mut self.rate_hint,
            Component::Edca => &mut self.edca,
        };
        *flag = enabled;
    }
}

/// Inclusive IGI clamp range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GainBounds {
    pub min: InitialGain,
    pub max: InitialGain,
}

impl GainBounds {
    pub const fn new(min: u8, max: u8) -> Self {
        Self {
            min: InitialGain::new(min),
            max: InitialGain::new(max),
        }
    }

    #[inline]
    pub fn clamp(&self, gain: InitialGain) -> InitialGain {
        gain.clamp(self.min, self.max)
    }

    #[inline]
    pub fn contains(&self, gain: InitialGain) -> bool {
        (self.min..=self.max).contains(&gain)
    }
}

/// Dynamic Initial Gain tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigConfig {
    /// Upper (exclusive) RSSI edges of the very-low, low, mid and high bands.
    pub band_breakpoints: [i32; 4],
    /// Target IGI per band, indexed very-low to very-high.
    pub gain_table: [u8; 5],
    pub connected_bounds: GainBounds,
    pub disconnected_bounds: GainBounds,
    /// IGI the disconnected state drifts back to.
    pub disconnected_gain: u8,
    /// Largest IGI move per disconnected nudge.
    pub disconnected_nudge_step: u8,
    /// Band-driven changes of this size or smaller are suppressed.
    pub min_step: u8,
    pub backoff_ticks: u32,
    /// Per-tick OFDM + CCK false alarms that trigger a gain reduction.
    pub false_alarm_threshold: u32,
    pub false_alarm_step: u8,
    pub rssi_min_valid: i32,
    pub rssi_max_valid: i32,
}

impl Default for DigConfig {
    fn default() -> Self {
        Self {
            band_breakpoints: DIG_DEFAULT_BAND_BREAKPOINTS,
            gain_table: DIG_DEFAULT_GAIN_TABLE,
            connected_bounds: GainBounds::new(DIG_DEFAULT_CONNECTED_MIN, DIG_DEFAULT_CONNECTED_MAX),
            disconnected_bounds: GainBounds::new(
                DIG_DEFAULT_DISCONNECTED_MIN,
                DIG_DEFAULT_DISCONNECTED_MAX,
            ),
            disconnected_gain: DIG_DEFAULT_DISCONNECTED_GAIN,
            disconnected_nudge_step: DIG_DEFAULT_DISCONNECTED_NUDGE_STEP,
            min_step: DIG_DEFAULT_MIN_STEP,
            backoff_ticks: DIG_DEFAULT_BACKOFF_TICKS,
            false_alarm_threshold: DIG_DEFAULT_FALSE_ALARM_THRESHOLD,
            false_alarm_step: DIG_DEFAULT_FALSE_ALARM_STEP,
            rssi_min_valid: RSSI_MIN_VALID,
            rssi_max_valid: RSSI_MAX_VALID,
        }
    }
}

impl DigConfig {
    fn validate(&self) -> Result<(), DmError> {
        if self.band_breakpoints.windows(2).any(|w| w[0] >= w[1]) {
            return Err(DmError::invalid_config(
                "dig.band_breakpoints",
                "must be strictly ascending",
            ));
        }
        for (field, bounds) in [
            ("dig.connected_bounds", self.connected_bounds),
            ("dig.disconnected_bounds", self.disconnected_bounds),
        ] {
            if bounds.min > bounds.max {
                return Err(DmError::invalid_config(field, "min above max"));
            }
        }
        if !self
            .disconnected_bounds
            .contains(InitialGain::new(self.disconnected_gain))
        {
            return Err(DmError::invalid_config(
                "dig.disconnected_gain",
                "outside disconnected_bounds",
            ));
        }
        if self.disconnected_nudge_step == 0 {
            return Err(DmError::invalid_config(
                "dig.disconnected_nudge_step",
                "must be non-zero",
            ));
        }
        if self.false_alarm_step == 0 {
            return Err(DmError::invalid_config(
                "dig.false_alarm_step",
                "must be non-zero",
            ));
        }
        if self.rssi_min_valid > self.rssi_max_valid {
            return Err(DmError::invalid_config(
                "dig.rssi_min_valid",
                "above rssi_max_valid",
            ));
        }
        Ok(())
    }
}

/// RX path selection tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RxPathConfig {
    /// Weight of the newest sample in the smoothed score, in (0, 1].
    pub alpha: f32,
    pub min_dwell_ticks: u32,
    pub hysteresis_margin: f32,
}

impl Default for RxPathConfig {
    fn default() -> Self {
        Self {
            alpha: RX_PATH_DEFAULT_ALPHA,
            min_dwell_ticks: RX_PATH_DEFAULT_MIN_DWELL_TICKS,
            hysteresis_margin: RX_PATH_DEFAULT_HYSTERESIS_MARGIN,
        }
    }
}

impl RxPathConfig {
    fn validate(&self) -> Result<(), DmError> {
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(DmError::invalid_config(
                "rx_path.alpha",
                format!("{} outside (0, 1]", self.alpha),
            ));
        }
        if !self.hysteresis_margin.is_finite() || self.hysteresis_margin < 0.0 {
            return Err(DmError::invalid_config(
                "rx_path.hysteresis_margin",
                "must be a non-negative number",
            ));
        }
        Ok(())
    }
}

/// TX power tracking tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TxPowerConfig {
    /// Ticks between calibration cycles.
    pub calibration_period: u32,
    /// Factory thermal reading; `None` adopts the first valid reading.
    pub thermal_baseline: Option<i32>,
    pub thermal_min: i32,
    pub thermal_max: i32,
    /// Index adjustment for each absolute thermal delta; the last entry covers larger deltas.
    pub step_table: Vec<i8>,
    pub index_max: i8,
}

impl Default for TxPowerConfig {
    fn default() -> Self {
        Self {
            calibration_period: TX_POWER_DEFAULT_CALIBRATION_PERIOD,
            thermal_baseline: None,
            thermal_min: TX_POWER_DEFAULT_THERMAL_MIN,
            thermal_max: TX_POWER_DEFAULT_THERMAL_MAX,
            step_table: TX_POWER_DEFAULT_STEP_TABLE.to_vec(),
            index_max: TX_POWER_DEFAULT_INDEX_MAX,
        }
    }
}

impl TxPowerConfig {
    fn validate(&self) -> Result<(), DmError> {
        if self.calibration_period == 0 {
            return Err(DmError::invalid_config(
                "tx_power.calibration_period",
                "must be non-zero",
            ));
        }
        if self.thermal_min > self.thermal_max {
            return Err(DmError::invalid_config(
                "tx_power.thermal_min",
                "above thermal_max",
            ));
        }
        if let Some(baseline) = self.thermal_baseline {
            if !(self.thermal_min..=self.thermal_max).contains(&baseline) {
                return Err(DmError::invalid_config(
                    "tx_power.thermal_baseline",
                    format!("{} outside the thermal range", baseline),
                ));
            }
        }
        if self.step_table.is_empty() {
            return Err(DmError::invalid_config(
                "tx_power.step_table",
                "must not be empty",
            ));
        }
        if self.step_table.iter().any(|step| *step < 0) {
            return Err(DmError::invalid_config(
                "tx_power.step_table",
                "entries are magnitudes and must be non-negative",
            ));
        }
        if self.index_max < 0 {
            return Err(DmError::invalid_config(
                "tx_power.index_max",
                "must be non-negative",
            ));
        }
        Ok(())
    }
}

/// Packet-detection and carrier-sense tables, indexed by RSSI band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub cck_pd: [u8; 5],
    pub ofdm_pd: [u8; 5],
    pub cs_ratio: [u8; 5],
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            cck_pd: THRESHOLD_DEFAULT_CCK_PD,
            ofdm_pd: THRESHOLD_DEFAULT_OFDM_PD,
            cs_ratio: THRESHOLD_DEFAULT_CS_RATIO,
        }
    }
}

/// Rate hint tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateHintConfig {
    /// RSSI samples averaged before hinting.
    pub window: usize,
    pub high_up: i32,
    pub high_down: i32,
    pub low_up: i32,
    pub low_down: i32,
}

impl Default for RateHintConfig {
    fn default() -> Self {
        Self {
            window: RATE_HINT_DEFAULT_WINDOW,
            high_up: RATE_HINT_DEFAULT_HIGH_UP,
            high_down: RATE_HINT_DEFAULT_HIGH_DOWN,
            low_up: RATE_HINT_DEFAULT_LOW_UP,
            low_down: RATE_HINT_DEFAULT_LOW_DOWN,
        }
    }
}

impl RateHintConfig {
    fn validate(&self) -> Result<(), DmError> {
        if self.window == 0 {
            return Err(DmError::invalid_config(
                "rate_hint.window",
                "must be non-zero",
            ));
        }
        if self.high_down > self.high_up || self.low_down > self.low_up {
            return Err(DmError::invalid_config(
                "rate_hint",
                "down thresholds must not exceed up thresholds",
            ));
        }
        if self.low_up >= self.high_up {
            return Err(DmError::invalid_config(
                "rate_hint.low_up",
                "must be below high_up",
            ));
        }
        Ok(())
    }
}

/// EDCA turbo tables and traffic classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdcaConfig {
    /// BE parameters for downlink-heavy traffic, indexed by [`VendorKind`].
    pub downlink: [u32; VendorKind::COUNT],
    /// BE parameters for uplink-heavy traffic, indexed by [`VendorKind`].
    pub uplink: [u32; VendorKind::COUNT],
    pub default_be_param: u32,
    /// TX bytes must exceed RX bytes by this factor to count as uplink.
    pub uplink_ratio: u64,
    pub idle_floor_bytes: u64,
    pub min_switch_interval_ms: u64,
}

impl Default for EdcaConfig {
    fn default() -> Self {
        Self {
            downlink: EDCA_DEFAULT_DL_TABLE,
            uplink: EDCA_DEFAULT_UL_TABLE,
            default_be_param: EDCA_DEFAULT_BE_PARAM,
            uplink_ratio: EDCA_DEFAULT_UPLINK_RATIO,
            idle_floor_bytes: EDCA_DEFAULT_IDLE_FLOOR_BYTES,
            min_switch_interval_ms: 0,
        }
    }
}

impl EdcaConfig {
    fn validate(&self) -> Result<(), DmError> {
        if self.uplink_ratio == 0 {
            return Err(DmError::invalid_config(
                "edca.uplink_ratio",
                "must be non-zero",
            ));
        }
        Ok(())
    }
}
