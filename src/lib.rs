//! `wlan_dm`: the periodic PHY Dynamic Mechanism watchdog of an 802.11 driver.
//!
//! Every watchdog period the driver calls [`DmController::run_watchdog_tick`].
//! The tick captures a statistics snapshot from the radio, decides whether the
//! link is stable enough to tune, and runs a fixed sequence of sub-controllers
//! that keep the PHY matched to the channel.
//!
//! ## Core Concepts
//!
//! - **[`DmController`]**: The dispatcher. Owns every controller's state and
//!   produces a [`TickReport`] per tick. Failures are isolated per controller.
//! - **Controllers**: DIG (initial gain), RX path selection, TX power
//!   tracking, CCK/OFDM thresholds, rate hints and EDCA turbo. See
//!   [`controllers`].
//! - **Collaborators**: [`RadioIo`], [`LinkState`] and [`RateControl`] hide
//!   the hardware, the link layer and rate adaptation.
//! - **Configuration**: [`DmConfig`] holds every breakpoint, hysteresis
//!   constant and table; it can be loaded from JSON.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use wlan_dm::sim::{SimConfig, Simulation};
//! use wlan_dm::{DmConfig, TickStatus};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut sim = Simulation::new(SimConfig::default(), DmConfig::default())?;
//!     for report in sim.run(10) {
//!         if report.status == TickStatus::Completed {
//!             println!("tick {}: applied {}", report.tick, report.applied);
//!         }
//!     }
//!
//!     // Against a real driver, build the controller directly.
//!     let dm = wlan_dm::DmController::new(DmConfig::default(), Arc::new(wlan_dm::SystemClock))?;
//!     assert_eq!(dm.config().antenna_count, 2);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod constants;
pub mod controllers;
pub mod error;
pub mod sim;
pub mod stats;
pub mod time;
pub mod traits;
pub mod types;
pub mod watchdog;

pub use config::DmConfig;
pub use controllers::ControlOutcome;
pub use error::{DmError, NotReadyReason, RadioIoError, Sensor};
pub use stats::{RadioStats, StatsSnapshot};
pub use time::mock_clock::MockClock;
pub use time::{Clock, SystemClock};
pub use traits::{LinkState, RadioIo, RateControl, RateTier};
pub use types::{AntennaIndex, Component, ComponentMask, InitialGain, VendorKind};
pub use watchdog::{DmController, SharedWatchdog, TickReport, TickStatus};
