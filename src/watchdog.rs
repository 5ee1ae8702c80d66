//! The DM watchdog dispatcher.
//!
//! [`DmController`] is the central orchestrator: once per period it captures
//! a statistics snapshot, checks that the link is in a state worth tuning,
//! and runs every enabled sub-controller in a fixed order. A failure in one
//! controller is recorded in the [`TickReport`] and never stops the others.

use std::sync::{Arc, Mutex, TryLockError};

use tracing::{debug, trace, warn};

use crate::config::DmConfig;
use crate::controllers::{
    AntennaSelectState, ControlOutcome, DigController, DigState, EdcaController, EdcaState,
    RateHintController, RateHintState, RxPathController, ThresholdController, TxPowerController,
    TxPowerState,
};
use crate::error::{DmError, NotReadyReason};
use crate::stats::{RadioStats, StatsSnapshot};
use crate::time::Clock;
use crate::traits::{LinkState, RadioIo, RateControl};
use crate::types::{Component, ComponentMask};

/// Whether a tick ran the controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    Completed,
    Skipped(NotReadyReason),
}

/// Outcome of one watchdog tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Snapshot sequence number; 0 when no snapshot was taken.
    pub tick: u64,
    pub status: TickStatus,
    /// Controllers that were invoked.
    pub ran: ComponentMask,
    /// Controllers that changed hardware or notified rate control.
    pub applied: ComponentMask,
    /// Controllers whose register write or antenna switch failed.
    pub failed: ComponentMask,
    /// Controllers that skipped a branch on an invalid sensor reading.
    pub sensor_skipped: ComponentMask,
    /// Every error of the tick, in dispatch order.
    pub errors: Vec<(Component, DmError)>,
}

impl TickReport {
    fn new(tick: u64) -> Self {
        Self {
            tick,
            status: TickStatus::Completed,
            ran: ComponentMask::EMPTY,
            applied: ComponentMask::EMPTY,
            failed: ComponentMask::EMPTY,
            sensor_skipped: ComponentMask::EMPTY,
            errors: Vec::new(),
        }
    }

    /// A no-op report for a tick that did not run the controllers.
    pub fn skipped(tick: u64, reason: NotReadyReason) -> Self {
        Self {
            status: TickStatus::Skipped(reason),
            ..Self::new(tick)
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, TickStatus::Skipped(_))
    }

    /// The first error recorded for `component`, if any.
    pub fn error_for(&self, component: Component) -> Option<&DmError> {
        self.errors
            .iter()
            .find(|(c, _)| *c == component)
            .map(|(_, e)| e)
    }

    fn record(&mut self, component: Component, result: Result<ControlOutcome, DmError>) {
        self.ran.insert(component);
        match result {
            Ok(ControlOutcome::Applied) => self.applied.insert(component),
            Ok(ControlOutcome::Unchanged) => {}
            Ok(outcome @ ControlOutcome::SensorSkipped { .. }) => {
                self.sensor_skipped.insert(component);
                if let Some(err) = outcome.sensor_error() {
                    self.errors.push((component, err));
                }
            }
            Err(err) => {
                warn!(%component, error = %err, "controller failed; continuing tick");
                self.failed.insert(component);
                self.errors.push((component, err));
            }
        }
    }
}

/// Owns every sub-controller and runs them once per watchdog tick.
#[derive(Debug)]
pub struct DmController {
    config: DmConfig,
    stats: StatsSnapshot,
    dig: DigController,
    rx_path: RxPathController,
    tx_power: TxPowerController,
    thresholds: ThresholdController,
    rate_hint: RateHintController,
    edca: EdcaController,
    ticks_connected: u32,
    last_stats: Option<RadioStats>,
}

impl DmController {
    /// Builds the watchdog from a validated configuration.
    ///
    /// # Parameters
    /// - `config`: All tunables and the initial ability flags.
    /// - `clock`: Time source for millisecond-based rules.
    ///
    /// # Errors
    /// - [`DmError::InvalidConfig`] - `config` failed validation
    pub fn new(config: DmConfig, clock: Arc<dyn Clock>) -> Result<Self, DmError> {
        config.validate()?;
        let rssi_valid = (config.dig.rssi_min_valid, config.dig.rssi_max_valid);
        Ok(Self {
            stats: StatsSnapshot::new(config.rate_hint.window, rssi_valid.0, rssi_valid.1),
            dig: DigController::new(
                config.dig.clone(),
                config.antenna_count as u8,
                config.abilities.dig,
            ),
            rx_path: RxPathController::new(
                config.rx_path.clone(),
                config.antenna_count,
                rssi_valid,
            ),
            tx_power: TxPowerController::new(config.tx_power.clone()),
            thresholds: ThresholdController::new(config.thresholds.clone()),
            rate_hint: RateHintController::new(config.rate_hint.clone()),
            edca: EdcaController::new(config.edca.clone(), clock),
            ticks_connected: 0,
            last_stats: None,
            config,
        })
    }

    pub fn config(&self) -> &DmConfig {
        &self.config
    }

    /// Enables or disables one controller from the next tick on.
    pub fn set_ability(&mut self, component: Component, enabled: bool) {
        debug!(%component, enabled, "ability changed");
        self.config.abilities.set(component, enabled);
        if component == Component::Dig {
            self.dig.set_enabled(enabled);
        }
    }

    pub fn dig_state(&self) -> &DigState {
        self.dig.state()
    }

    pub fn antenna_state(&self) -> &AntennaSelectState {
        self.rx_path.state()
    }

    pub fn tx_power_state(&self) -> &TxPowerState {
        self.tx_power.state()
    }

    pub fn thresholds(&self) -> &ThresholdController {
        &self.thresholds
    }

    pub fn rate_hint_state(&self) -> &RateHintState {
        self.rate_hint.state()
    }

    pub fn edca_state(&self) -> &EdcaState {
        self.edca.state()
    }

    /// Statistics captured by the most recent tick.
    pub fn last_stats(&self) -> Option<&RadioStats> {
        self.last_stats.as_ref()
    }

    /// Runs one watchdog period.
    ///
    /// Captures statistics, then either skips the tick (scan in progress or
    /// link still settling) or runs DIG, RX path, TX power, thresholds, rate
    /// hint and EDCA in that order. Thresholds read the DIG band published
    /// earlier in the same tick.
    ///
    /// # Parameters
    /// - `radio`: Register and counter access.
    /// - `link`: Association state and peer vendor.
    /// - `rate`: Receiver of rate hints.
    ///
    /// # Returns
    /// A [`TickReport`]; errors are collected there rather than returned.
    pub fn run_watchdog_tick(
        &mut self,
        radio: &mut dyn RadioIo,
        link: &dyn LinkState,
        rate: &mut dyn RateControl,
    ) -> TickReport {
        let stats = self.stats.capture(radio, link);
        let tick = stats.tick;

        self.ticks_connected = if stats.link_connected {
            self.ticks_connected.saturating_add(1)
        } else {
            0
        };

        if let Some(reason) = self.not_ready_reason(&stats) {
            trace!(tick, %reason, "watchdog tick skipped");
            self.last_stats = Some(stats);
            return TickReport::skipped(tick, reason);
        }

        let mut report = TickReport::new(tick);
        for component in Component::DISPATCH_ORDER {
            if !self.config.abilities.is_enabled(component) {
                continue;
            }
            let result = match component {
                Component::Dig => self.dig.run(&stats, radio),
                Component::RxPath => self.rx_path.run(&stats, radio),
                Component::TxPower => self.tx_power.run(&stats, radio),
                Component::Thresholds => self.thresholds.run(self.dig.state(), &stats, radio),
                Component::RateHint => self.rate_hint.run(&stats, rate),
                Component::Edca => self.edca.run(&stats, radio),
            };
            report.record(component, result);
        }

        debug!(
            tick,
            ran = %report.ran,
            applied = %report.applied,
            failed = %report.failed,
            "watchdog tick completed"
        );
        self.last_stats = Some(stats);
        report
    }

    fn not_ready_reason(&self, stats: &RadioStats) -> Option<NotReadyReason> {
        if stats.scanning {
            return Some(NotReadyReason::Scanning);
        }
        let required = self.config.association_settle_ticks;
        if stats.link_connected && self.ticks_connected < required {
            return Some(NotReadyReason::AssociationSettling {
                ticks_connected: self.ticks_connected,
                required,
            });
        }
        None
    }
}

/// A [`DmController`] behind a mutex, for drivers that may fire a tick while
/// the previous one is still running.
#[derive(Debug, Clone)]
pub struct SharedWatchdog {
    inner: Arc<Mutex<DmController>>,
}

impl SharedWatchdog {
    pub fn new(controller: DmController) -> Self {
        Self {
            inner: Arc::new(Mutex::new(controller)),
        }
    }

    /// Runs a tick unless one is already in progress.
    ///
    /// # Returns
    /// The tick's report, or a `Skipped(TickInProgress)` report with tick 0
    /// when the controller is busy.
    pub fn try_tick(
        &self,
        radio: &mut dyn RadioIo,
        link: &dyn LinkState,
        rate: &mut dyn RateControl,
    ) -> TickReport {
        match self.inner.try_lock() {
            Ok(mut controller) => controller.run_watchdog_tick(radio, link, rate),
            Err(TryLockError::Poisoned(poisoned)) => {
                poisoned.into_inner().run_watchdog_tick(radio, link, rate)
            }
            Err(TryLockError::WouldBlock) => {
                trace!("watchdog tick skipped: previous tick still running");
                TickReport::skipped(0, NotReadyReason::TickInProgress)
            }
        }
    }

    /// Runs `f` with exclusive access to the controller, waiting for any running tick.
    pub fn with_controller<R>(&self, f: impl FnOnce(&mut DmController) -> R) -> R {
        let mut controller = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut controller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::DigMode;
    use crate::controllers::test_radio::RecordingRadio;
    use crate::time::mock_clock::MockClock;
    use crate::types::VendorKind;

    struct Link {
        connected: bool,
        scanning: bool,
    }

    impl LinkState for Link {
        fn is_connected(&self) -> bool {
            self.connected
        }
        fn detected_peer_vendor(&self) -> VendorKind {
            VendorKind::Unknown
        }
        fn is_scanning(&self) -> bool {
            self.scanning
        }
    }

    struct NullRate;

    impl RateControl for NullRate {
        fn on_rate_hint(&mut self, _retry_count: u32, _rssi: i32) {}
    }

    const CONNECTED: Link = Link {
        connected: true,
        scanning: false,
    };

    fn controller(settle: u32) -> DmController {
        let config = DmConfig {
            association_settle_ticks: settle,
            ..DmConfig::default()
        };
        DmController::new(config, Arc::new(MockClock::default())).unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let config = DmConfig {
            antenna_count: 9,
            ..DmConfig::default()
        };
        let err = DmController::new(config, Arc::new(MockClock::default())).unwrap_err();
        assert!(
            matches!(err, DmError::InvalidConfig { ref field, .. } if field == "antenna_count")
        );
    }

    #[test]
    fn scanning_skips_whole_tick() {
        let mut dm = controller(0);
        let mut radio = RecordingRadio::new();
        let link = Link {
            connected: true,
            scanning: true,
        };
        let report = dm.run_watchdog_tick(&mut radio, &link, &mut NullRate);
        assert_eq!(report.status, TickStatus::Skipped(NotReadyReason::Scanning));
        assert!(report.ran.is_empty());
        assert!(radio.writes.is_empty());
        assert_eq!(report.tick, 1);
    }

    #[test]
    fn settling_link_is_skipped_until_required_ticks() {
        let mut dm = controller(2);
        let mut radio = RecordingRadio::new();
        let first = dm.run_watchdog_tick(&mut radio, &CONNECTED, &mut NullRate);
        assert_eq!(
            first.status,
            TickStatus::Skipped(NotReadyReason::AssociationSettling {
                ticks_connected: 1,
                required: 2
            })
        );
        let second = dm.run_watchdog_tick(&mut radio, &CONNECTED, &mut NullRate);
        assert_eq!(second.status, TickStatus::Completed);
        assert_eq!(second.ran.len(), 6);
    }

    #[test]
    fn disconnected_ticks_still_run() {
        let mut dm = controller(3);
        let mut radio = RecordingRadio::new();
        let link = Link {
            connected: false,
            scanning: false,
        };
        let report = dm.run_watchdog_tick(&mut radio, &link, &mut NullRate);
        assert_eq!(report.status, TickStatus::Completed);
        assert_eq!(dm.dig_state().mode, DigMode::Disconnected);
    }

    #[test]
    fn disabled_abilities_are_not_dispatched() {
        let mut dm = controller(0);
        dm.set_ability(Component::Dig, false);
        dm.set_ability(Component::Edca, false);
        assert_eq!(dm.dig_state().mode, DigMode::Disabled);

        let mut radio = RecordingRadio::new();
        let report = dm.run_watchdog_tick(&mut radio, &CONNECTED, &mut NullRate);
        assert!(!report.ran.contains(Component::Dig));
        assert!(!report.ran.contains(Component::Edca));
        assert!(report.ran.contains(Component::Thresholds));
    }

    #[test]
    fn shared_watchdog_reports_tick_in_progress() {
        let shared = SharedWatchdog::new(controller(0));
        let mut radio = RecordingRadio::new();
        let report = shared.with_controller(|_| {
            let mut inner_radio = RecordingRadio::new();
            shared.try_tick(&mut inner_radio, &CONNECTED, &mut NullRate)
        });
        assert_eq!(
            report.status,
            TickStatus::Skipped(NotReadyReason::TickInProgress)
        );
        assert_eq!(report.tick, 0);

        let report = shared.try_tick(&mut radio, &CONNECTED, &mut NullRate);
        assert_eq!(report.status, TickStatus::Completed);
        assert_eq!(shared.with_controller(|dm| dm.last_stats().map(|s| s.tick)), Some(1));
    }
}
