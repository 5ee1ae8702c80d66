//! Deterministic simulation runs of the DM watchdog.
//!
//! Seeds a noisy simulated radio, runs many ticks and checks that the control
//! loop stays inside its bounds and self-heals when register writes fail.

use wlan_dm::constants::REG_OFDM0_XA_AGC_CORE1;
use wlan_dm::sim::{SimConfig, Simulation};
use wlan_dm::{DmConfig, DmError};

#[test]
fn noisy_runs_stay_within_bounds() {
    let dm_config = DmConfig::default();
    let bounds = dm_config.dig.connected_bounds;
    let index_max = dm_config.tx_power.index_max;

    for seed in 0..8 {
        let config = SimConfig {
            seed,
            rssi_jitter: 15,
            thermal_drift_per_tick: 0.6,
            false_alarm_burst_probability: 0.2,
            scan_probability: 0.1,
            ..SimConfig::default()
        };
        let mut sim = Simulation::new(config, dm_config.clone()).unwrap();
        sim.run(150);

        let dm = sim.controller();
        assert!(bounds.contains(dm.dig_state().current_gain), "seed {seed}");
        assert!(dm.tx_power_state().applied_offset.abs() <= index_max);
        assert!((dm.antenna_state().active.value() as usize) < dm.config().antenna_count);
    }
}

#[test]
fn write_failures_are_reported_and_recovered() {
    let config = SimConfig {
        seed: 11,
        rssi_jitter: 0,
        rssi_dropout_probability: 0.0,
        false_alarm_burst_probability: 0.0,
        write_failure_probability: 0.5,
        ..SimConfig::default()
    };
    let mut sim = Simulation::new(config, DmConfig::default()).unwrap();
    let reports = sim.run(80);

    assert!(reports.iter().any(|r| !r.failed.is_empty()));
    for report in &reports {
        let hard_errors = report
            .errors
            .iter()
            .filter(|(_, e)| !matches!(e, DmError::SensorInvalid { .. }))
            .count();
        assert_eq!(report.failed.len() as usize, hard_errors);
    }
    // Mid-band gain is eventually programmed despite the failures.
    assert_eq!(sim.radio.register(REG_OFDM0_XA_AGC_CORE1), Some(0x26));
    assert_eq!(sim.controller().dig_state().current_gain, 0x26u8);
}

#[test]
fn same_seed_reproduces_hardware_state() {
    let run = |seed| {
        let config = SimConfig {
            seed,
            write_failure_probability: 0.1,
            ..SimConfig::default()
        };
        let mut sim = Simulation::new(config, DmConfig::default()).unwrap();
        sim.run(60);
        (
            sim.radio.write_counts(),
            sim.controller().dig_state().clone(),
            sim.controller().antenna_state().active,
        )
    };
    assert_eq!(run(3), run(3));
}
