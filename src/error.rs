//! DM watchdog error types.
//!
//! Distinguishes collaborator I/O failures from the controller-level
//! conditions the watchdog reports: failed register writes, invalid sensor
//! readings, ticks skipped because the link is not ready, and rejected
//! configuration. The `thiserror` crate is used for the definitions.
//!
//! None of these are fatal. A tick collects them into its
//! [`TickReport`](crate::watchdog::TickReport) and the next tick retries.

use thiserror::Error;

use crate::types::Component;

/// Errors reported by the [`RadioIo`](crate::traits::RadioIo) collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RadioIoError {
    /// The hardware refused a register write.
    #[error("Register write rejected at 0x{addr:04X}")]
    WriteRejected { addr: u32 },

    /// The bus did not complete the access in time.
    #[error("Register access timed out at 0x{addr:04X}")]
    Timeout { addr: u32 },

    /// The device is powered down or being removed.
    #[error("Radio device unavailable")]
    DeviceUnavailable,
}

/// A hardware sensor read by the controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensor {
    AggregateRssi,
    AntennaRssi(u8),
    Thermal,
}

impl std::fmt::Display for Sensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sensor::AggregateRssi => f.write_str("aggregate RSSI"),
            Sensor::AntennaRssi(index) => write!(f, "antenna {} RSSI", index),
            Sensor::Thermal => f.write_str("thermal meter"),
        }
    }
}

/// Why a whole tick was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotReadyReason {
    /// A scan is in progress; channel statistics are meaningless.
    Scanning,
    /// The link came up too recently for its statistics to be trusted.
    AssociationSettling { ticks_connected: u32, required: u32 },
    /// Another tick is still running.
    TickInProgress,
}

impl std::fmt::Display for NotReadyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotReadyReason::Scanning => f.write_str("scan in progress"),
            NotReadyReason::AssociationSettling {
                ticks_connected,
                required,
            } => write!(
                f,
                "link settling ({} of {} ticks)",
                ticks_connected, required
            ),
            NotReadyReason::TickInProgress => f.write_str("previous tick still running"),
        }
    }
}

/// Main error type for the DM watchdog.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DmError {
    /// A register write issued by a controller failed; its state stays unapplied.
    #[error("{component}: write of 0x{value:08X} to register 0x{addr:04X} failed: {source}")]
    RegisterWrite {
        component: Component,
        addr: u32,
        value: u32,
        #[source]
        source: RadioIoError,
    },

    /// Switching the active RX antenna failed.
    #[error("Antenna select to index {index} failed: {source}")]
    AntennaSelect {
        index: u8,
        #[source]
        source: RadioIoError,
    },

    /// A sensor returned a value outside its physical range.
    #[error("Invalid {sensor} reading: {value}")]
    SensorInvalid { sensor: Sensor, value: i32 },

    /// The device is not in a stable operating state.
    #[error("Device not ready: {0}")]
    NotReady(NotReadyReason),

    /// A configuration value cannot be used.
    #[error("Invalid configuration for '{field}': {description}")]
    InvalidConfig { field: String, description: String },
}

impl DmError {
    /// Shorthand for building an [`DmError::InvalidConfig`].
    pub fn invalid_config(field: &str, description: impl Into<String>) -> Self {
        DmError::InvalidConfig {
            field: field.to_string(),
            description: description.into(),
        }
    }
}
