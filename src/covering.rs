//! The window covering controller.
//!
//! This module provides [`CoveringController`], the central component that
//! coordinates calibration, movement, obstruction detection and command
//! arbitration for one motorized covering driven by a pair of relays.
//!
//! # Overview
//!
//! The controller:
//! - Estimates position purely from elapsed travel time (no sensors)
//! - Self-calibrates traverse time and reference power from current draw
//! - Detects obstructions via power anomaly or excess travel time
//! - Arbitrates physical buttons against home-hub target writes
//! - Raises change notifications for the accessory characteristic surface
//!
//! # Control model
//!
//! Everything runs on one logical thread. A fixed-period tick (100 ms
//! recommended) drives a state machine one step per call; asynchronous
//! surfaces (hub writes, hold requests, RPC) only mutate fields and then
//! run a single synchronous pass for quick reaction.
//!
//! # Example
//!
//! ```rust
//! use rs_shades::{CoveringConfig, CoveringController, State};
//! use rs_shades::hal::{MockConfigStore, MockInput, MockOutput, MockPowerMeter};
//!
//! let cfg = CoveringConfig::default().with_calibration(20_000, 100.0);
//! let (in0, _) = MockInput::new();
//! let (in1, _) = MockInput::new();
//! let (out0, _) = MockOutput::new();
//! let (out1, _) = MockOutput::new();
//! let (pm0, _) = MockPowerMeter::new();
//! let (pm1, _) = MockPowerMeter::new();
//! let (store, _) = MockConfigStore::new();
//!
//! let mut covering =
//!     CoveringController::new(cfg, store, [in0, in1], [out0, out1], [pm0, pm1]);
//! assert_eq!(covering.state(), State::Idle);
//!
//! // Main loop - call tick() every 100 ms
//! covering.set_target(50.0, "demo");
//! covering.tick(100).unwrap();
//! assert_eq!(covering.state(), State::Move);
//! ```

extern crate alloc;

use alloc::vec::Vec;

use crate::arbiter::{self, ClientAction, PairAction};
use crate::config::{ConfigError, ConfigUpdate, CoveringConfig, InputMode};
use crate::position::{self, FULLY_CLOSED, FULLY_OPEN, MIN_POS_DIFF, TARGET_FIXUP_DIFF};
use crate::traits::{ConfigStore, Direction, Input, InputEvent, Output, PowerMeter};

/// Recommended tick period.
pub const TICK_MS: u64 = 100;

/// Fraction of the reference power confirming the motor left ramp-up.
pub const RAMP_CONFIRM_FRACTION: f32 = 0.75;

/// Power above this multiple of the reference is an obstruction candidate.
pub const OBSTRUCTION_POWER_COEFF: f32 = 2.5;

/// Travel beyond this multiple of the full-traverse time is an obstruction.
pub const OBSTRUCTION_TIME_COEFF: f32 = 1.5;

/// Over-power must persist longer than this before declaring an obstruction.
pub const OBSTRUCTION_MIN_DURATION_MS: u64 = 100;

/// Minimum duration of the measured calibration phase.
pub const CAL_MIN_MOVE_MS: u64 = 1000;

/// Hub movement context expires after this long.
pub const CLIENT_CONTEXT_TTL_MS: u64 = 60_000;

// ============================================================================
// States and surface types
// ============================================================================

/// State of the covering state machine.
///
/// The numeric codes are part of the RPC surface (forced-state requests)
/// and must stay stable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum State {
    /// At rest, waiting for a target change or a forced state.
    Idle,
    /// Calibration: all off, mark uncalibrated, start driving closed.
    PreCalClose,
    /// Calibration: closing until the motor stops drawing power.
    CalClose,
    /// Calibration: settle with both relays off.
    PostCalClose,
    /// Calibration: start driving open, reset the power accumulator.
    PreCalOpen,
    /// Calibration: opening; accumulate power and measure traverse time.
    CalOpen,
    /// Calibration: record results and return to idle.
    PostCalOpen,
    /// Movement decided; energize the relay for the desired direction.
    Move,
    /// Waiting for power draw to confirm the motor actually started.
    RampUp,
    /// Travelling; position estimate updates every tick.
    Moving,
    /// De-energize and persist.
    Stop,
    /// Waiting for both channels to fall below the idle threshold.
    Stopping,
    /// Recoverable fault; reconcile and return to idle.
    Error,
}

impl State {
    /// Returns the stable numeric code for the RPC surface.
    pub const fn code(&self) -> i32 {
        match self {
            State::Idle => 0,
            State::PreCalClose => 10,
            State::CalClose => 11,
            State::PostCalClose => 12,
            State::PreCalOpen => 13,
            State::CalOpen => 14,
            State::PostCalOpen => 15,
            State::Move => 20,
            State::RampUp => 22,
            State::Moving => 23,
            State::Stop => 24,
            State::Stopping => 25,
            State::Error => 100,
        }
    }

    /// Parses a numeric code from the RPC surface.
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(State::Idle),
            10 => Some(State::PreCalClose),
            11 => Some(State::CalClose),
            12 => Some(State::PostCalClose),
            13 => Some(State::PreCalOpen),
            14 => Some(State::CalOpen),
            15 => Some(State::PostCalOpen),
            20 => Some(State::Move),
            22 => Some(State::RampUp),
            23 => Some(State::Moving),
            24 => Some(State::Stop),
            25 => Some(State::Stopping),
            100 => Some(State::Error),
            _ => None,
        }
    }

    /// Returns the state name as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            State::Idle => "idle",
            State::PreCalClose => "precal_close",
            State::CalClose => "cal_close",
            State::PostCalClose => "postcal_close",
            State::PreCalOpen => "precal_open",
            State::CalOpen => "cal_open",
            State::PostCalOpen => "postcal_open",
            State::Move => "move",
            State::RampUp => "rampup",
            State::Moving => "moving",
            State::Stop => "stop",
            State::Stopping => "stopping",
            State::Error => "error",
        }
    }
}

/// Movement state exposed on the accessory surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PositionState {
    /// Not moving.
    Stopped,
    /// Moving toward fully closed.
    GoingToMinimum,
    /// Moving toward fully open.
    GoingToMaximum,
}

impl PositionState {
    fn of(dir: Direction) -> Self {
        match dir {
            Direction::None => PositionState::Stopped,
            Direction::Close => PositionState::GoingToMinimum,
            Direction::Open => PositionState::GoingToMaximum,
        }
    }
}

/// Change notification for the accessory characteristic surface.
///
/// Raised exactly once per actual change; the bridge layer consumes these
/// via [`CoveringController::drain_events`].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Event {
    /// The position estimate changed.
    CurrentPosition(f32),
    /// The target position changed.
    TargetPosition(f32),
    /// The movement state changed.
    PositionState(PositionState),
    /// The obstruction flag changed.
    Obstruction(bool),
}

/// Diagnostic snapshot for the RPC surface.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CoveringInfo {
    /// Covering name.
    pub name: crate::config::ShortString,
    /// State machine state code.
    pub state: i32,
    /// State machine state name.
    pub state_str: &'static str,
    /// Power-measured calibration completed.
    pub calibrated: bool,
    /// Operator-supplied calibration active.
    pub manually_calibrated: bool,
    /// Input mode code.
    pub in_mode: u8,
    /// Input swap flag.
    pub swap_inputs: bool,
    /// Output swap flag.
    pub swap_outputs: bool,
    /// Full-traverse time in milliseconds.
    pub move_time_ms: u32,
    /// Reference moving power in watts.
    pub move_power: f32,
    /// Idle power threshold in watts.
    pub idle_power_thr: f32,
    /// Current position estimate.
    pub current_pos: f32,
    /// Target position, if set.
    pub target_pos: Option<f32>,
    /// Movement state.
    pub position_state: PositionState,
    /// Obstruction flag.
    pub obstruction_detected: bool,
    /// What last changed the target.
    pub last_target_source: &'static str,
    /// Persistence failures since boot (in-memory state stays authoritative).
    pub save_errors: u32,
}

// ============================================================================
// Controller
// ============================================================================

/// Window covering controller.
///
/// Owns two inputs, two relay outputs and two power meters (one pair per
/// travel direction), plus the persisted configuration and its store. The
/// `swap_inputs` / `swap_outputs` flags remap which physical channel means
/// open or close; power meters follow the outputs.
///
/// # Type Parameters
///
/// - `IN`: physical input ([`Input`] trait)
/// - `OUT`: relay output ([`Output`] trait)
/// - `PM`: power meter ([`PowerMeter`] trait)
/// - `ST`: configuration store ([`ConfigStore`] trait)
///
/// # Thread Safety
///
/// The controller itself is not thread-safe. For multi-threaded scenarios
/// (e.g. web server + tick loop), wrap in the `SharedCovering` helper from
/// the services module (requires the `web` feature) and funnel all access
/// through it.
pub struct CoveringController<IN, OUT, PM, ST>
where
    IN: Input,
    OUT: Output,
    PM: PowerMeter,
    ST: ConfigStore,
{
    cfg: CoveringConfig,
    store: ST,
    inputs: [IN; 2],
    outputs: [OUT; 2],
    meters: [PM; 2],
    out_on: [bool; 2],

    cur_pos: f32,
    tgt_pos: Option<f32>,
    state: State,
    pending_state: Option<State>,
    pending_stop: bool,
    moving_dir: Direction,
    last_move_dir: Direction,
    last_client_cmd_ms: Option<u64>,
    last_target_src: &'static str,
    obstruction: bool,
    obstruction_since: Option<u64>,
    p_sum: f32,
    p_num: u32,
    phase_start_ms: u64,
    move_start_pos: f32,
    now_ms: u64,
    save_errors: u32,
    events: Vec<Event>,
}

impl<IN, OUT, PM, ST> CoveringController<IN, OUT, PM, ST>
where
    IN: Input,
    OUT: Output,
    PM: PowerMeter,
    ST: ConfigStore,
{
    /// Create a new controller from a loaded configuration and its hardware.
    ///
    /// The position estimate starts from the persisted `current_pos`; the
    /// target starts reconciled to it so nothing moves at boot.
    pub fn new(
        cfg: CoveringConfig,
        store: ST,
        inputs: [IN; 2],
        outputs: [OUT; 2],
        meters: [PM; 2],
    ) -> Self {
        let cur_pos = position::clamp(cfg.current_pos);
        Self {
            cfg,
            store,
            inputs,
            outputs,
            meters,
            out_on: [false; 2],
            cur_pos,
            tgt_pos: Some(cur_pos),
            state: State::Idle,
            pending_state: None,
            pending_stop: false,
            moving_dir: Direction::None,
            last_move_dir: Direction::None,
            last_client_cmd_ms: None,
            last_target_src: "boot",
            obstruction: false,
            obstruction_since: None,
            p_sum: 0.0,
            p_num: 0,
            phase_start_ms: 0,
            move_start_pos: cur_pos,
            now_ms: 0,
            save_errors: 0,
            events: Vec::new(),
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Current position estimate, 0 (closed) to 100 (open).
    pub fn current_position(&self) -> f32 {
        self.cur_pos
    }

    /// Target position, if set.
    pub fn target_position(&self) -> Option<f32> {
        self.tgt_pos
    }

    /// Current state machine state.
    pub fn state(&self) -> State {
        self.state
    }

    /// True when the state machine is at rest.
    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    /// Current movement direction.
    pub fn moving_direction(&self) -> Direction {
        self.moving_dir
    }

    /// Movement state for the accessory surface.
    pub fn position_state(&self) -> PositionState {
        PositionState::of(self.moving_dir)
    }

    /// Obstruction flag; clears on the next successful movement start.
    pub fn obstruction_detected(&self) -> bool {
        self.obstruction
    }

    /// The active configuration.
    pub fn config(&self) -> &CoveringConfig {
        &self.cfg
    }

    /// Diagnostic snapshot for the RPC surface.
    pub fn info(&self) -> CoveringInfo {
        CoveringInfo {
            name: self.cfg.name.clone(),
            state: self.state.code(),
            state_str: self.state.as_str(),
            calibrated: self.cfg.calibrated,
            manually_calibrated: self.cfg.manually_calibrated,
            in_mode: self.cfg.in_mode.code(),
            swap_inputs: self.cfg.swap_inputs,
            swap_outputs: self.cfg.swap_outputs,
            move_time_ms: self.cfg.move_time_ms,
            move_power: self.cfg.move_power,
            idle_power_thr: self.cfg.idle_power_thr,
            current_pos: self.cur_pos,
            target_pos: self.tgt_pos,
            position_state: self.position_state(),
            obstruction_detected: self.obstruction,
            last_target_source: self.last_target_src,
            save_errors: self.save_errors,
        }
    }

    /// Drains pending change notifications, oldest first.
    pub fn drain_events(&mut self) -> Vec<Event> {
        core::mem::take(&mut self.events)
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Set the target position. Clamped to [0, 100]; setting the same value
    /// twice raises exactly one notification.
    ///
    /// The movement itself happens on the next tick.
    pub fn set_target(&mut self, pos: f32, src: &'static str) {
        let pos = position::clamp(pos);
        if self.tgt_pos == Some(pos) {
            return;
        }
        self.tgt_pos = Some(pos);
        self.last_target_src = src;
        self.events.push(Event::TargetPosition(pos));
    }

    /// Set the target and run one state machine pass for quick reaction.
    pub fn set_target_now(
        &mut self,
        pos: f32,
        src: &'static str,
        now_ms: u64,
    ) -> Result<(), OUT::Error> {
        self.now_ms = now_ms;
        self.set_target(pos, src);
        self.run_once()
    }

    /// Handle a hub-originated target write.
    ///
    /// Hub tiles send a limit value on every tap regardless of intent; see
    /// [`crate::arbiter::client_request`] for the disambiguation rules. The
    /// movement context used for guessing expires after 60 seconds, and any
    /// non-limit write clears it.
    pub fn client_set_target(&mut self, value: f32, now_ms: u64) -> Result<(), OUT::Error> {
        self.now_ms = now_ms;
        let fresh = self
            .last_client_cmd_ms
            .is_some_and(|t| now_ms.saturating_sub(t) <= CLIENT_CONTEXT_TTL_MS);
        let lmd = if fresh {
            self.last_move_dir
        } else {
            Direction::None
        };
        let value = position::clamp(value);
        match arbiter::client_request(value, self.cur_pos, self.tgt_pos, lmd) {
            ClientAction::Literal => self.set_target(value, "hub"),
            ClientAction::Ignore => {}
            ClientAction::Toggle => self.cycle_press("hub"),
        }
        self.last_client_cmd_ms = if position::is_limit(value) {
            Some(now_ms)
        } else {
            None
        };
        // Run immediately to improve reaction time.
        self.run_once()
    }

    /// Queue a stop ("hold position") and run one pass to service it.
    pub fn request_hold(&mut self, now_ms: u64) -> Result<(), OUT::Error> {
        self.pending_stop = true;
        self.tick(now_ms)
    }

    /// Force the state machine into a state (operator surface).
    ///
    /// Calibration is started this way. When not idle, the machine first
    /// runs through Stop/Stopping, then applies the forced state.
    pub fn force_state(&mut self, state: State, now_ms: u64) -> Result<(), OUT::Error> {
        self.now_ms = now_ms;
        self.pending_state = Some(state);
        if self.state != State::Idle {
            self.enter(State::Stop);
        }
        self.run_once()
    }

    /// Start a calibration cycle.
    pub fn calibrate(&mut self, now_ms: u64) -> Result<(), OUT::Error> {
        self.force_state(State::PreCalClose, now_ms)
    }

    /// Apply an operator configuration update and persist on success.
    ///
    /// Returns whether the change requires re-initialization (see
    /// [`CoveringConfig::apply_update`]). Invalid updates are rejected with
    /// nothing mutated.
    pub fn set_config(&mut self, upd: &ConfigUpdate) -> Result<bool, ConfigError> {
        let restart = self.cfg.apply_update(upd)?;
        self.save_state();
        Ok(restart)
    }

    /// Force both relays off and flush state; call before power-down.
    pub fn shutdown(&mut self) -> Result<(), OUT::Error> {
        let oi = self.open_out_idx();
        self.set_output(oi, false, "shutdown")?;
        self.set_output(1 - oi, false, "shutdown")?;
        self.save_state();
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------------

    /// Advance the controller - call every [`TICK_MS`] milliseconds.
    ///
    /// Services a queued stop, consumes pending input events and runs one
    /// state machine step. Relay failures propagate; power meter failures
    /// are handled internally by transitioning through Error.
    pub fn tick(&mut self, now_ms: u64) -> Result<(), OUT::Error> {
        self.now_ms = now_ms;
        if self.pending_stop {
            self.pending_stop = false;
            if !matches!(
                self.state,
                State::Idle | State::Stop | State::Stopping | State::Error
            ) {
                self.enter(State::Stop);
                // Without this the machine would resume toward the old
                // target as soon as it reaches idle again.
                let pos = self.cur_pos;
                self.set_target(pos, "hold");
            }
        }
        self.poll_inputs()?;
        self.run_once()
    }

    fn poll_inputs(&mut self) -> Result<(), OUT::Error> {
        match self.cfg.in_mode {
            InputMode::Detached => {
                while self.inputs[0].poll_event().is_some() {}
                while self.inputs[1].poll_event().is_some() {}
            }
            InputMode::Single => {
                let idx = self.open_in_idx();
                while let Some((ev, level)) = self.inputs[idx].poll_event() {
                    self.on_single_input(ev, level)?;
                }
                while self.inputs[1 - idx].poll_event().is_some() {}
            }
            InputMode::SeparateMomentary | InputMode::SeparateToggle => {
                let oi = self.open_in_idx();
                while let Some((ev, level)) = self.inputs[oi].poll_event() {
                    self.on_pair_input(Direction::Open, ev, level)?;
                }
                while let Some((ev, level)) = self.inputs[1 - oi].poll_event() {
                    self.on_pair_input(Direction::Close, ev, level)?;
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Input handling
    // ------------------------------------------------------------------------

    fn on_pair_input(
        &mut self,
        dir: Direction,
        ev: InputEvent,
        level: bool,
    ) -> Result<(), OUT::Error> {
        if !self.cfg.is_calibrated() {
            return self.uncalibrated_input();
        }
        let toggle = self.cfg.in_mode == InputMode::SeparateToggle;
        match arbiter::button_pair(ev, level, toggle, self.moving_dir, dir) {
            PairAction::None => return Ok(()),
            PairAction::MoveToLimit => {
                if let Some(limit) = position::limit_of(dir) {
                    self.last_move_dir = dir;
                    self.set_target(limit, "button");
                }
            }
            PairAction::Stop => {
                // Run the state machine first so cur_pos is up to date.
                self.run_once()?;
                let pos = self.cur_pos;
                self.set_target(pos, "button");
            }
        }
        // Run immediately for quicker response.
        self.run_once()
    }

    fn on_single_input(&mut self, ev: InputEvent, level: bool) -> Result<(), OUT::Error> {
        if !self.cfg.is_calibrated() {
            return self.uncalibrated_input();
        }
        if ev != InputEvent::Change || !level {
            return Ok(());
        }
        self.cycle_press("button");
        self.run_once()
    }

    /// Advance the open-stop-close-stop cycle by one press.
    fn cycle_press(&mut self, src: &'static str) {
        let target = arbiter::single_press_target(self.cur_pos, self.moving_dir, self.last_move_dir);
        self.set_target(target, src);
    }

    /// Direct relay drive for uncalibrated coverings.
    ///
    /// The state machine cannot run without traverse times, so inputs map
    /// straight onto the relays with mutual exclusion and no reversal
    /// without a stop in between.
    fn uncalibrated_input(&mut self) -> Result<(), OUT::Error> {
        if self.state != State::Idle {
            return Ok(());
        }
        let ii = self.open_in_idx();
        let want_open = self.inputs[ii].get_state();
        let want_close = self.inputs[1 - ii].get_state();
        let oi = self.open_out_idx();
        let (open, close) =
            arbiter::uncalibrated_drive(want_open, want_close, self.out_on[oi], self.out_on[1 - oi]);
        self.set_output(oi, open, "button")?;
        self.set_output(1 - oi, close, "button")
    }

    // ------------------------------------------------------------------------
    // State machine
    // ------------------------------------------------------------------------

    /// Run one state machine step.
    fn run_once(&mut self) -> Result<(), OUT::Error> {
        let ss = self.state.as_str();
        match self.state {
            State::Idle => {
                if let Some(forced) = self.pending_state.take() {
                    if forced != self.state {
                        self.enter(forced);
                    }
                    return Ok(());
                }
                if self.desired_direction() != Direction::None {
                    self.enter(State::Move);
                }
            }
            State::PreCalClose => {
                let oi = self.open_out_idx();
                self.set_output(oi, false, ss)?;
                self.set_output(1 - oi, false, ss)?;
                self.cfg.calibrated = false;
                self.save_state();
                self.set_output(1 - oi, true, ss)?;
                self.enter(State::CalClose);
            }
            State::CalClose => match self.read_power(Direction::Close) {
                Err(()) => self.enter(State::Error),
                Ok(p) => {
                    let elapsed = self.phase_elapsed();
                    // The below-idle check is only trusted once the motor had
                    // time to ramp up, otherwise a slow start reads as done.
                    if p < self.cfg.idle_power_thr
                        && elapsed >= self.cfg.max_ramp_up_time_ms as u64
                    {
                        let ci = 1 - self.open_out_idx();
                        self.set_output(ci, false, ss)?;
                        self.enter(State::PostCalClose);
                    }
                }
            },
            State::PostCalClose => {
                let oi = self.open_out_idx();
                self.set_output(oi, false, ss)?;
                self.set_output(1 - oi, false, ss)?;
                self.enter(State::PreCalOpen);
            }
            State::PreCalOpen => {
                let oi = self.open_out_idx();
                self.set_output(1 - oi, false, ss)?;
                self.set_output(oi, true, ss)?;
                self.p_sum = 0.0;
                self.p_num = 0;
                self.enter(State::CalOpen);
            }
            State::CalOpen => match self.read_power(Direction::Open) {
                Err(()) => self.enter(State::Error),
                Ok(p) => {
                    let elapsed = self.phase_elapsed();
                    if p < self.cfg.idle_power_thr && elapsed > CAL_MIN_MOVE_MS {
                        let oi = self.open_out_idx();
                        self.set_output(oi, false, ss)?;
                        self.cfg.move_time_ms = elapsed as u32;
                        if self.p_num > 0 {
                            self.cfg.move_power = self.p_sum / self.p_num as f32;
                        }
                        self.enter(State::PostCalOpen);
                    } else {
                        self.p_sum += p;
                        self.p_num += 1;
                    }
                }
            },
            State::PostCalOpen => {
                self.cfg.calibrated = true;
                // A fresh measured cycle supersedes operator-supplied times.
                self.cfg.manually_calibrated = false;
                // The measured phase ends against the open stop.
                self.set_current_pos(FULLY_OPEN);
                self.save_state();
                self.set_target((FULLY_OPEN - FULLY_CLOSED) / 2.0, "calibration");
                self.enter(State::Idle);
            }
            State::Move => {
                let dir = self.desired_direction();
                let at_limit = position::limit_of(dir) == Some(self.cur_pos);
                if dir == Direction::None || at_limit {
                    self.enter(State::Stop);
                    return Ok(());
                }
                self.set_obstruction(false);
                self.move_start_pos = self.cur_pos;
                self.obstruction_since = None;
                self.drive(dir, ss)?;
                self.enter(State::RampUp);
            }
            State::RampUp => {
                let p = match self.read_power(self.moving_dir) {
                    Ok(p) => p,
                    Err(()) => {
                        self.pending_state = Some(State::Error);
                        self.enter(State::Stop);
                        return Ok(());
                    }
                };
                // Some motors show no usable power signature while
                // accelerating; operator-supplied timing skips confirmation.
                if self.cfg.manually_calibrated
                    || p >= self.cfg.move_power * RAMP_CONFIRM_FRACTION
                {
                    self.enter(State::Moving);
                } else if self.phase_elapsed() > self.cfg.max_ramp_up_time_ms as u64 {
                    // Failed to start moving.
                    self.set_obstruction(true);
                    self.pending_state = Some(State::Error);
                    self.enter(State::Stop);
                }
            }
            State::Moving => return self.run_moving(ss),
            State::Stop => {
                self.drive(Direction::None, ss)?;
                self.save_state();
                self.enter(State::Stopping);
            }
            State::Stopping => {
                let p0 = self.read_power(Direction::Open).unwrap_or(0.0);
                let p1 = self.read_power(Direction::Close).unwrap_or(0.0);
                if p0 < self.cfg.idle_power_thr && p1 < self.cfg.idle_power_thr {
                    if self.pending_state == Some(State::Error) {
                        self.pending_state = None;
                        self.enter(State::Error);
                    } else {
                        self.enter(State::Idle);
                    }
                }
            }
            State::Error => {
                self.drive(Direction::None, ss)?;
                let pos = self.cur_pos;
                self.set_target(pos, "fault");
                self.enter(State::Idle);
            }
        }
        Ok(())
    }

    fn run_moving(&mut self, ss: &'static str) -> Result<(), OUT::Error> {
        let elapsed = self.phase_elapsed();
        let rate = position::ms_per_pct(&self.cfg, self.tgt_pos);
        let new_pos = position::project(self.move_start_pos, self.moving_dir, elapsed, rate);
        let p = match self.read_power(self.moving_dir) {
            Ok(p) => p,
            Err(()) => {
                self.pending_state = Some(State::Error);
                self.enter(State::Stop);
                return Ok(());
            }
        };
        self.set_current_pos(new_pos);

        // Obstruction detection. The over-power check needs a measured
        // reference; the excess-time check works for both methods.
        if self.cfg.calibrated && p > self.cfg.move_power * OBSTRUCTION_POWER_COEFF {
            if self.obstruction_since.is_none() {
                self.obstruction_since = Some(self.now_ms);
            }
        } else {
            self.obstruction_since = None;
        }
        let overpower = self
            .obstruction_since
            .is_some_and(|t| self.now_ms - t > OBSTRUCTION_MIN_DURATION_MS);
        let too_long_ms = (self.cfg.move_time_ms as f32 * OBSTRUCTION_TIME_COEFF) as u64;
        if overpower || (p > self.cfg.idle_power_thr && elapsed > too_long_ms) {
            self.set_obstruction(true);
            self.pending_state = Some(State::Error);
            self.drive(Direction::None, ss)?;
            self.enter(State::Stop);
            return Ok(());
        }

        let want = self.desired_direction();
        let reverse = want != self.moving_dir && want != Direction::None;
        let toward_limit = self.tgt_pos == position::limit_of(self.moving_dir);
        if toward_limit && !reverse && !self.cfg.manually_calibrated {
            // Heading for an end-stop: keep moving until no current flows,
            // then snap the estimate to the exact limit.
            if p > self.cfg.idle_power_thr
                || elapsed < self.cfg.max_ramp_up_time_ms as u64
            {
                return Ok(());
            }
            if let Some(limit) = position::limit_of(self.moving_dir) {
                self.set_current_pos(limit);
            }
        } else if want == self.moving_dir {
            // Still moving.
            return Ok(());
        } else if let Some(tgt) = self.tgt_pos {
            // We stopped short or got reversed. Reconcile the target with
            // the estimate, pretend we wanted to be exactly here.
            if (tgt - self.cur_pos).abs() < TARGET_FIXUP_DIFF {
                let pos = self.cur_pos;
                self.set_target(pos, "fixup");
            }
        }
        // Cut power immediately to minimize estimate error.
        self.drive(Direction::None, ss)?;
        self.enter(State::Stop);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn open_out_idx(&self) -> usize {
        usize::from(self.cfg.swap_outputs)
    }

    fn open_in_idx(&self) -> usize {
        usize::from(self.cfg.swap_inputs)
    }

    fn phase_elapsed(&self) -> u64 {
        self.now_ms.saturating_sub(self.phase_start_ms)
    }

    fn enter(&mut self, state: State) {
        if self.state == state {
            return;
        }
        self.state = state;
        self.phase_start_ms = self.now_ms;
    }

    fn desired_direction(&self) -> Direction {
        let Some(tgt) = self.tgt_pos else {
            return Direction::None;
        };
        if !self.cfg.is_calibrated() {
            return Direction::None;
        }
        let diff = tgt - self.cur_pos;
        if diff.abs() < MIN_POS_DIFF {
            Direction::None
        } else if diff > 0.0 {
            Direction::Open
        } else {
            Direction::Close
        }
    }

    fn set_output(&mut self, idx: usize, on: bool, source: &str) -> Result<(), OUT::Error> {
        self.outputs[idx].set_state(on, source)?;
        self.out_on[idx] = on;
        Ok(())
    }

    /// Energize the relay pair for a direction (mutually exclusive).
    ///
    /// Without trusted calibration data the relays stay off; uncalibrated
    /// coverings are driven directly from the inputs instead.
    fn drive(&mut self, dir: Direction, source: &str) -> Result<(), OUT::Error> {
        let (want_open, want_close) = if self.cfg.is_calibrated() {
            match dir {
                Direction::Open => (true, false),
                Direction::Close => (false, true),
                Direction::None => (false, false),
            }
        } else {
            (false, false)
        };
        let oi = self.open_out_idx();
        self.set_output(oi, want_open, source)?;
        self.set_output(1 - oi, want_close, source)?;
        if self.moving_dir != dir {
            self.events.push(Event::PositionState(PositionState::of(dir)));
        }
        self.moving_dir = dir;
        if dir != Direction::None {
            self.last_move_dir = dir;
        }
        Ok(())
    }

    fn meter_idx(&self, dir: Direction) -> usize {
        let oi = self.open_out_idx();
        match dir {
            Direction::Open => oi,
            _ => 1 - oi,
        }
    }

    /// Read the power meter for a direction; any failure collapses to `Err`.
    fn read_power(&mut self, dir: Direction) -> Result<f32, ()> {
        let idx = self.meter_idx(dir);
        self.meters[idx].get_power_w().map_err(|_| ())
    }

    fn set_current_pos(&mut self, pos: f32) {
        let pos = position::clamp(pos);
        if pos == self.cur_pos {
            return;
        }
        self.cur_pos = pos;
        self.cfg.current_pos = pos;
        self.events.push(Event::CurrentPosition(pos));
    }

    fn set_obstruction(&mut self, detected: bool) {
        if self.obstruction == detected {
            return;
        }
        self.obstruction = detected;
        self.events.push(Event::Obstruction(detected));
    }

    /// Persist the configuration; failures are counted, not fatal.
    fn save_state(&mut self) {
        if self.store.save(&self.cfg).is_err() {
            self.save_errors = self.save_errors.saturating_add(1);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
