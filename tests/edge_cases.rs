//! Edge case tests: sensor failures, manual calibration, persistence,
//! forced states and configuration changes at runtime.

use rs_shades::hal::{
    InputHandle, MockConfigStore, MockInput, MockOutput, MockPowerMeter, OutputHandle, PowerHandle,
    StoreHandle,
};
use rs_shades::{
    ConfigError, ConfigUpdate, CoveringConfig, CoveringController, InputMode, State, FULLY_OPEN,
    TICK_MS,
};

type TestController = CoveringController<MockInput, MockOutput, MockPowerMeter, MockConfigStore>;

struct Rig {
    ctl: TestController,
    in_open: InputHandle,
    in_close: InputHandle,
    out_open: OutputHandle,
    out_close: OutputHandle,
    pm_open: PowerHandle,
    pm_close: PowerHandle,
    store: StoreHandle,
    now: u64,
}

impl Rig {
    fn new(cfg: CoveringConfig) -> Self {
        let (in0, in_open) = MockInput::new();
        let (in1, in_close) = MockInput::new();
        let (out0, out_open) = MockOutput::new();
        let (out1, out_close) = MockOutput::new();
        let (pm0, pm_open) = MockPowerMeter::new();
        let (pm1, pm_close) = MockPowerMeter::new();
        let (store, store_handle) = MockConfigStore::new();
        Rig {
            ctl: CoveringController::new(cfg, store, [in0, in1], [out0, out1], [pm0, pm1]),
            in_open,
            in_close,
            out_open,
            out_close,
            pm_open,
            pm_close,
            store: store_handle,
            now: 0,
        }
    }

    fn tick(&mut self) {
        self.now += TICK_MS;
        self.ctl.tick(self.now).unwrap();
    }

    fn tick_n(&mut self, n: usize) {
        for _ in 0..n {
            self.tick();
        }
    }

    /// Tick with the power readings slaved to the relay states, which is
    /// enough physics for tests that never reach an end-stop.
    fn tick_powered(&mut self, watts: f32) {
        self.pm_open
            .set_watts(if self.out_open.is_on() { watts } else { 0.0 });
        self.pm_close
            .set_watts(if self.out_close.is_on() { watts } else { 0.0 });
        self.tick();
    }
}

fn calibrated_cfg(pos: f32) -> CoveringConfig {
    CoveringConfig::default()
        .with_calibration(20_000, 100.0)
        .with_current_pos(pos)
}

// ============================================================================
// Sensor failures
// ============================================================================

#[test]
fn meter_failure_during_rampup_recovers_to_idle() {
    let mut rig = Rig::new(calibrated_cfg(20.0));
    rig.ctl.set_target(80.0, "test");
    rig.tick(); // Idle -> Move
    rig.tick(); // Move -> RampUp
    assert_eq!(rig.ctl.state(), State::RampUp);

    rig.pm_open.set_fail(true);
    rig.tick(); // RampUp -> Stop (error queued)
    assert_eq!(rig.ctl.state(), State::Stop);

    // Stopping treats failed reads as 0 W, so the machine drains through
    // Error back to Idle instead of wedging.
    rig.tick_n(4);
    assert_eq!(rig.ctl.state(), State::Idle);
    assert!(!rig.out_open.is_on());
    assert!(!rig.out_close.is_on());
    // Position estimate stays at the last known value; target reconciled.
    assert_eq!(rig.ctl.target_position(), Some(rig.ctl.current_position()));
    // A sensor failure is not an obstruction.
    assert!(!rig.ctl.obstruction_detected());
}

#[test]
fn meter_failure_during_moving_recovers_to_idle() {
    let mut rig = Rig::new(calibrated_cfg(20.0));
    rig.ctl.set_target(80.0, "test");
    rig.pm_open.set_watts(100.0);
    rig.tick_n(3);
    assert_eq!(rig.ctl.state(), State::Moving);
    rig.tick_n(5);
    let pos_before = rig.ctl.current_position();

    rig.pm_open.set_fail(true);
    rig.tick();
    assert_eq!(rig.ctl.state(), State::Stop);
    rig.tick_n(4);
    assert_eq!(rig.ctl.state(), State::Idle);
    // Movement is aborted, not retried.
    assert_eq!(rig.ctl.state(), State::Idle);
    assert!(rig.ctl.current_position() >= pos_before);
}

#[test]
fn rampup_timeout_flags_obstruction() {
    // Motor never draws power: stuck or disconnected.
    let mut rig = Rig::new(calibrated_cfg(20.0));
    rig.ctl.set_target(80.0, "test");
    rig.pm_open.set_watts(0.0);

    // Default ramp-up budget is 1500 ms.
    rig.tick_n(20);
    assert!(rig.ctl.obstruction_detected());
    assert!(!rig.out_open.is_on());

    rig.tick_n(5);
    assert_eq!(rig.ctl.state(), State::Idle);
    assert_eq!(rig.ctl.target_position(), Some(rig.ctl.current_position()));
}

// ============================================================================
// Manual calibration
// ============================================================================

fn manual_cfg(pos: f32) -> CoveringConfig {
    CoveringConfig::default()
        .with_manual_calibration(10_000, 12_000)
        .with_current_pos(pos)
}

#[test]
fn manual_calibration_skips_ramp_confirmation() {
    let mut rig = Rig::new(manual_cfg(0.0));
    rig.ctl.set_target(50.0, "test");
    rig.tick(); // Idle -> Move
    rig.tick(); // Move -> RampUp
    // No power signature at all, yet the motor is trusted to be moving.
    rig.tick();
    assert_eq!(rig.ctl.state(), State::Moving);
    assert!(!rig.ctl.obstruction_detected());
}

#[test]
fn manual_calibration_times_out_movement_by_clock() {
    let mut rig = Rig::new(manual_cfg(0.0));
    rig.ctl.set_target(50.0, "test");
    // 50% at 100 ms/percent = 5 s, plus the three transition ticks.
    rig.tick_n(3);
    assert_eq!(rig.ctl.state(), State::Moving);
    rig.tick_n(49);
    assert_eq!(rig.ctl.state(), State::Moving);
    rig.tick_n(10);
    assert!((rig.ctl.current_position() - 50.0).abs() < 1.0);
    assert_eq!(rig.ctl.state(), State::Idle);
}

#[test]
fn manual_limit_approach_overdrives_past_nominal_time() {
    let mut rig = Rig::new(manual_cfg(0.0));
    rig.ctl.set_target(FULLY_OPEN, "test");
    rig.tick_n(3); // into Moving

    // Nominal full travel is 10 s, but the limit approach uses 12 s so the
    // motor is guaranteed to reach the end-stop. At 10.5 s the relay must
    // still be energized.
    rig.tick_n(105);
    assert_eq!(rig.ctl.state(), State::Moving);
    assert!(rig.out_open.is_on());

    // By 12 s the estimate reaches the limit and the movement ends.
    rig.tick_n(20);
    assert_eq!(rig.ctl.current_position(), FULLY_OPEN);
    assert!(!rig.out_open.is_on());
    // No false obstruction from the overdrive.
    assert!(!rig.ctl.obstruction_detected());
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn saves_are_throttled_to_stop_points() {
    let mut rig = Rig::new(calibrated_cfg(0.0));
    rig.ctl.set_target(50.0, "test");

    // A full movement: position changes every tick, but only the stop
    // persists.
    for _ in 0..120 {
        rig.tick_powered(100.0);
    }
    assert_eq!(rig.ctl.state(), State::Idle);
    assert_eq!(rig.store.save_count(), 1);

    // The persisted snapshot carries the final position.
    let saved = rig.store.saved().unwrap();
    assert!((saved.current_pos - 50.0).abs() < 1.0);
}

#[test]
fn store_failure_does_not_block_calibration() {
    let mut rig = Rig::new(CoveringConfig::default().with_current_pos(50.0));
    rig.store.set_fail(true);

    let now = rig.now;
    rig.ctl.calibrate(now).unwrap();
    // Close homing: 30 ticks of power, then idle reading.
    for _ in 0..30 {
        rig.tick_powered(120.0);
    }
    rig.pm_close.set_watts(0.0);
    rig.pm_open.set_watts(0.0);
    rig.tick_n(3); // CalClose exit, settle, PreCalOpen
    for _ in 0..30 {
        rig.tick_powered(120.0);
    }
    rig.pm_open.set_watts(0.0);
    rig.pm_close.set_watts(0.0);
    rig.tick_n(3);

    assert!(rig.ctl.config().calibrated);
    assert!(rig.ctl.info().save_errors >= 2);
    assert_eq!(rig.store.save_count(), 0);
}

#[test]
fn shutdown_forces_outputs_off_and_flushes() {
    let mut rig = Rig::new(calibrated_cfg(20.0));
    rig.ctl.set_target(80.0, "test");
    rig.pm_open.set_watts(100.0);
    rig.tick_n(3);
    assert!(rig.out_open.is_on());
    let saves_before = rig.store.save_count();

    rig.ctl.shutdown().unwrap();
    assert!(!rig.out_open.is_on());
    assert!(!rig.out_close.is_on());
    assert_eq!(rig.store.save_count(), saves_before + 1);
}

// ============================================================================
// Hold and forced states
// ============================================================================

#[test]
fn hold_mid_move_keeps_position() {
    let mut rig = Rig::new(calibrated_cfg(0.0));
    rig.ctl.set_target(FULLY_OPEN, "test");
    rig.pm_open.set_watts(100.0);
    rig.tick_n(20);
    assert_eq!(rig.ctl.state(), State::Moving);

    rig.pm_open.set_watts(0.0);
    let now = rig.now + TICK_MS;
    rig.now = now;
    rig.ctl.request_hold(now).unwrap();
    assert!(!rig.out_open.is_on());
    let held_at = rig.ctl.current_position();
    assert_eq!(rig.ctl.target_position(), Some(held_at));

    // And it stays held.
    rig.tick_n(10);
    assert_eq!(rig.ctl.state(), State::Idle);
    assert_eq!(rig.ctl.current_position(), held_at);
}

#[test]
fn forced_calibration_mid_move_queues_through_stop() {
    let mut rig = Rig::new(calibrated_cfg(0.0));
    rig.ctl.set_target(FULLY_OPEN, "test");
    rig.pm_open.set_watts(100.0);
    rig.tick_n(10);
    assert_eq!(rig.ctl.state(), State::Moving);

    let now = rig.now + TICK_MS;
    rig.now = now;
    rig.ctl.force_state(State::PreCalClose, now).unwrap();
    // Stop happened immediately; calibration starts once everything is
    // quiet.
    rig.pm_open.set_watts(0.0);
    rig.tick(); // Stopping -> Idle
    rig.tick(); // Idle applies the forced state
    assert_eq!(rig.ctl.state(), State::PreCalClose);
}

// ============================================================================
// Configuration at runtime
// ============================================================================

#[test]
fn invalid_config_rejected_without_side_effects() {
    let mut rig = Rig::new(calibrated_cfg(50.0));
    let upd = ConfigUpdate {
        in_mode: Some(9),
        ..Default::default()
    };
    assert_eq!(rig.ctl.set_config(&upd), Err(ConfigError::InvalidInMode(9)));
    assert!(rig.ctl.config().calibrated);
    assert_eq!(rig.store.save_count(), 0);
}

#[test]
fn swap_outputs_update_clears_calibration_and_persists() {
    let mut rig = Rig::new(calibrated_cfg(50.0));
    let upd = ConfigUpdate {
        swap_outputs: Some(true),
        ..Default::default()
    };
    assert_eq!(rig.ctl.set_config(&upd), Ok(true));
    assert!(!rig.ctl.config().calibrated);
    assert_eq!(rig.store.save_count(), 1);
    assert!(rig.store.saved().unwrap().swap_outputs);

    // With calibration gone the covering refuses to move via the machine.
    rig.ctl.set_target(FULLY_OPEN, "test");
    rig.tick_n(5);
    assert_eq!(rig.ctl.state(), State::Idle);
    assert!(!rig.out_open.is_on());
    assert!(!rig.out_close.is_on());
}

#[test]
fn swap_inputs_remaps_button_directions() {
    let cfg = calibrated_cfg(50.0).with_swap_inputs(true);
    let mut rig = Rig::new(cfg);

    // With swapped inputs, physical input 0 is the close button.
    rig.in_open.press();
    rig.tick();
    assert_eq!(rig.ctl.target_position(), Some(0.0));
}

#[test]
fn detached_inputs_are_ignored() {
    let cfg = calibrated_cfg(50.0).with_in_mode(InputMode::Detached);
    let mut rig = Rig::new(cfg);

    rig.in_open.press();
    rig.in_close.press();
    rig.tick_n(3);
    assert_eq!(rig.ctl.state(), State::Idle);
    assert_eq!(rig.ctl.target_position(), Some(50.0));
    assert!(!rig.out_open.is_on());
    assert!(!rig.out_close.is_on());
}

#[test]
fn toggle_release_stops_matching_direction() {
    let cfg = calibrated_cfg(0.0).with_in_mode(InputMode::SeparateToggle);
    let mut rig = Rig::new(cfg);

    rig.in_open.press();
    rig.tick_powered(100.0);
    assert_eq!(rig.ctl.target_position(), Some(FULLY_OPEN));
    for _ in 0..10 {
        rig.tick_powered(100.0);
    }
    assert_eq!(rig.ctl.state(), State::Moving);

    // Releasing the open switch while opening stops the movement.
    rig.in_open.release();
    rig.tick_powered(100.0);
    let tgt = rig.ctl.target_position().unwrap();
    assert_ne!(tgt, FULLY_OPEN);
    assert!((tgt - rig.ctl.current_position()).abs() < 1.0);
}
