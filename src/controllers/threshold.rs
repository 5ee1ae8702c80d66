//! CCK/OFDM packet-detection and carrier-sense thresholds.
//!
//! A pure function of the DIG band published earlier in the same tick and
//! whether the current rate is CCK. The only state is a cache of the values
//! last written, so unchanged thresholds are never rewritten.

use tracing::{debug, warn};

use super::ControlOutcome;
use super::dig::{DigState, RssiBand};
use crate::config::ThresholdConfig;
use crate::constants::{REG_CCK_CS_RATIO, REG_PD_THRESHOLD};
use crate::error::DmError;
use crate::stats::RadioStats;
use crate::traits::RadioIo;
use crate::types::Component;

/// Register values for one `(band, rate class)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdSetting {
    pub pd_th: u8,
    pub cs_ratio: u8,
}

/// Derives thresholds from the DIG band and skips redundant writes.
#[derive(Debug, Clone)]
pub struct ThresholdController {
    config: ThresholdConfig,
    last_pd_th: Option<u8>,
    last_cs_ratio: Option<u8>,
}

impl ThresholdController {
    pub fn new(config: ThresholdConfig) -> Self {
        Self {
            config,
            last_pd_th: None,
            last_cs_ratio: None,
        }
    }

    /// Table lookup for `band` under CCK or OFDM operation.
    pub fn setting_for(&self, band: RssiBand, is_cck_rate: bool) -> ThresholdSetting {
        let pd_table = if is_cck_rate {
            &self.config.cck_pd
        } else {
            &self.config.ofdm_pd
        };
        ThresholdSetting {
            pd_th: pd_table[band.index()],
            cs_ratio: self.config.cs_ratio[band.index()],
        }
    }

    /// Values most recently written, if any.
    pub fn last_written(&self) -> (Option<u8>, Option<u8>) {
        (self.last_pd_th, self.last_cs_ratio)
    }

    /// Writes whichever threshold differs from the cached value.
    ///
    /// # Errors
    /// - [`DmError::RegisterWrite`] - The failing register keeps its old cache entry,
    ///   so the next tick writes it again.
    pub fn run(
        &mut self,
        dig: &DigState,
        stats: &RadioStats,
        radio: &mut dyn RadioIo,
    ) -> Result<ControlOutcome, DmError> {
        let setting = self.setting_for(dig.band, stats.is_cck_rate);
        debug!(band = ?dig.band, cck = stats.is_cck_rate, ?setting, "thresholds computed");

        let mut outcome = ControlOutcome::Unchanged;
        if self.last_pd_th != Some(setting.pd_th) {
            write_threshold(radio, REG_PD_THRESHOLD, setting.pd_th)?;
            self.last_pd_th = Some(setting.pd_th);
            outcome = ControlOutcome::Applied;
        }
        if self.last_cs_ratio != Some(setting.cs_ratio) {
            write_threshold(radio, REG_CCK_CS_RATIO, setting.cs_ratio)?;
            self.last_cs_ratio = Some(setting.cs_ratio);
            outcome = ControlOutcome::Applied;
        }
        Ok(outcome)
    }
}

fn write_threshold(radio: &mut dyn RadioIo, addr: u32, value: u8) -> Result<(), DmError> {
    radio.write_register(addr, value as u32).map_err(|source| {
        warn!(addr, value, error = %source, "threshold write failed");
        DmError::RegisterWrite {
            component: Component::Thresholds,
            addr,
            value: value as u32,
            source,
        }
    })
}
