//! Register map and reference tuning values for the DM controllers.
//!
//! The register addresses follow the baseband layout of the RTL819x family.
//! The tuning values are only the defaults of [`DmConfig`](crate::config::DmConfig);
//! every one of them can be replaced through configuration.

// --- Baseband Register Map ---

/// OFDM AGC core register for RX path A; holds the initial gain (IGI).
pub const REG_OFDM0_XA_AGC_CORE1: u32 = 0x0C50;
/// Offset between the AGC core registers of consecutive RX paths.
pub const REG_AGC_CORE_PATH_STRIDE: u32 = 0x08;
/// Packet detection threshold register.
pub const REG_PD_THRESHOLD: u32 = 0x0A0A;
/// CCK carrier-sense ratio register.
pub const REG_CCK_CS_RATIO: u32 = 0x0AAA;
/// TX AGC power index offset register.
pub const REG_TX_AGC_OFFSET: u32 = 0x0E00;
/// EDCA best-effort queue parameter register (AIFS | CWmin | CWmax | TXOP).
pub const REG_EDCA_BE_PARAM: u32 = 0x02A0;

/// Address of the AGC core register for RX path `path`.
#[inline]
pub const fn agc_core_register(path: u8) -> u32 {
    REG_OFDM0_XA_AGC_CORE1 + REG_AGC_CORE_PATH_STRIDE * path as u32
}

// --- General ---

/// Maximum number of RX antenna paths.
pub const MAX_RX_ANTENNAS: usize = 4;
/// Minimum number of RX antenna paths.
pub const MIN_RX_ANTENNAS: usize = 2;
/// Default number of RX antenna paths.
pub const DEFAULT_ANTENNA_COUNT: usize = 2;
/// Default ticks the link must be up before tuning starts.
pub const DEFAULT_ASSOCIATION_SETTLE_TICKS: u32 = 2;
/// Default watchdog period, in milliseconds.
pub const DEFAULT_WATCHDOG_PERIOD_MS: u64 = 2000;

// --- RSSI Scale (0..=100, percentage style) ---

/// Lowest RSSI value treated as a real sample; 0 means "no sample".
pub const RSSI_MIN_VALID: i32 = 1;
/// Highest RSSI value on the driver scale.
pub const RSSI_MAX_VALID: i32 = 100;

// --- DIG Defaults ---

/// Upper edges of the very-low, low, mid and high bands.
pub const DIG_DEFAULT_BAND_BREAKPOINTS: [i32; 4] = [20, 40, 65, 80];
/// Target IGI per band, very-low to very-high.
pub const DIG_DEFAULT_GAIN_TABLE: [u8; 5] = [0x32, 0x2C, 0x26, 0x20, 0x1C];
/// Connected-mode IGI clamp.
pub const DIG_DEFAULT_CONNECTED_MIN: u8 = 0x1C;
pub const DIG_DEFAULT_CONNECTED_MAX: u8 = 0x3E;
/// Disconnected-mode IGI clamp (wider).
pub const DIG_DEFAULT_DISCONNECTED_MIN: u8 = 0x17;
pub const DIG_DEFAULT_DISCONNECTED_MAX: u8 = 0x50;
/// IGI used when no peer is available.
pub const DIG_DEFAULT_DISCONNECTED_GAIN: u8 = 0x32;
/// Largest IGI change applied per nudge while disconnected.
pub const DIG_DEFAULT_DISCONNECTED_NUDGE_STEP: u8 = 2;
/// Band-driven changes smaller than or equal to this are ignored.
pub const DIG_DEFAULT_MIN_STEP: u8 = 2;
/// Ticks after a gain change before another change is allowed.
pub const DIG_DEFAULT_BACKOFF_TICKS: u32 = 2;
/// Per-tick false alarms (OFDM + CCK) above which gain is reduced.
pub const DIG_DEFAULT_FALSE_ALARM_THRESHOLD: u32 = 1000;
/// IGI reduction per false-alarm correction.
pub const DIG_DEFAULT_FALSE_ALARM_STEP: u8 = 2;

// --- RX Path Selection Defaults ---

/// Weight of the newest RSSI sample in the smoothed antenna score.
pub const RX_PATH_DEFAULT_ALPHA: f32 = 0.125;
/// Ticks an antenna must stay active before another switch.
pub const RX_PATH_DEFAULT_MIN_DWELL_TICKS: u32 = 4;
/// Score lead a challenger needs over the active antenna.
pub const RX_PATH_DEFAULT_HYSTERESIS_MARGIN: f32 = 5.0;

// --- TX Power Tracking Defaults ---

/// Ticks between thermal calibrations.
pub const TX_POWER_DEFAULT_CALIBRATION_PERIOD: u32 = 5;
/// Physically plausible thermal meter range.
pub const TX_POWER_DEFAULT_THERMAL_MIN: i32 = 1;
pub const TX_POWER_DEFAULT_THERMAL_MAX: i32 = 63;
/// Power index adjustment by absolute thermal delta (index = |delta|).
pub const TX_POWER_DEFAULT_STEP_TABLE: [i8; 10] = [0, 0, 1, 1, 2, 2, 3, 4, 5, 6];
/// Bound on the applied power index offset.
pub const TX_POWER_DEFAULT_INDEX_MAX: i8 = 6;

// --- CCK/OFDM Threshold Defaults ---

/// Packet detection threshold per band for CCK rates.
pub const THRESHOLD_DEFAULT_CCK_PD: [u8; 5] = [0x40, 0x48, 0x83, 0x83, 0xCD];
/// Packet detection threshold per band for OFDM rates.
pub const THRESHOLD_DEFAULT_OFDM_PD: [u8; 5] = [0x40, 0x42, 0x47, 0x4D, 0x52];
/// Carrier-sense ratio per band.
pub const THRESHOLD_DEFAULT_CS_RATIO: [u8; 5] = [0x87, 0x87, 0x87, 0xC7, 0xCD];

// --- Rate Hint Defaults ---

/// Number of RSSI samples averaged for rate hints.
pub const RATE_HINT_DEFAULT_WINDOW: usize = 4;
/// RSSI needed to enter the high tier / fall below to leave it.
pub const RATE_HINT_DEFAULT_HIGH_UP: i32 = 63;
pub const RATE_HINT_DEFAULT_HIGH_DOWN: i32 = 58;
/// RSSI needed to enter the middle tier / fall below to leave it.
pub const RATE_HINT_DEFAULT_LOW_UP: i32 = 30;
pub const RATE_HINT_DEFAULT_LOW_DOWN: i32 = 25;

// --- EDCA Turbo Defaults ---

/// Downlink-biased BE parameters per peer vendor.
pub const EDCA_DEFAULT_DL_TABLE: [u32; 7] = [
    0x005E_4322, // Unknown
    0x0000_A44F, // Realtek
    0x005E_4322, // Realtek 92SE
    0x0060_4322, // Broadcom
    0x0000_A44F, // Ralink
    0x005E_A44F, // Atheros
    0x005E_A42B, // Cisco
];
/// Uplink-biased BE parameters per peer vendor.
pub const EDCA_DEFAULT_UL_TABLE: [u32; 7] = [
    0x005E_4322, // Unknown
    0x0000_A44F, // Realtek
    0x005E_4322, // Realtek 92SE
    0x0060_4322, // Broadcom
    0x005E_A44F, // Ralink
    0x005E_A44F, // Atheros
    0x005E_A42B, // Cisco
];
/// BE parameters used when traffic is idle.
pub const EDCA_DEFAULT_BE_PARAM: u32 = 0x0000_A42B;
/// Uplink is preferred when TX traffic exceeds RX traffic by this factor.
pub const EDCA_DEFAULT_UPLINK_RATIO: u64 = 4;
/// Bytes per tick below which a direction counts as idle.
pub const EDCA_DEFAULT_IDLE_FLOOR_BYTES: u64 = 1024;
