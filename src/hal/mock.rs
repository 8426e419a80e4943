//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for every hardware and persistence
//! trait, enabling development and testing on desktop without a relay board.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockInput`] | [`Input`] | Queued events and a settable level |
//! | [`MockOutput`] | [`Output`] | Records relay switching |
//! | [`MockPowerMeter`] | [`PowerMeter`] | Settable wattage, injectable failures |
//! | [`MockClock`] | [`Clock`] | Controllable time source |
//! | [`MockConfigStore`] | [`ConfigStore`] | Counts saves, injectable failures |
//!
//! Each mock is created together with a *handle* sharing its state, so a
//! test can keep driving the simulation (changing power readings, pressing
//! buttons, inspecting relays) after the mock itself moved into the
//! controller.
//!
//! # Example
//!
//! ```rust
//! use rs_shades::hal::{MockInput, MockPowerMeter};
//! use rs_shades::traits::{Input, InputEvent, PowerMeter};
//!
//! let (mut input, handle) = MockInput::new();
//! handle.press();
//! assert_eq!(input.poll_event(), Some((InputEvent::Change, true)));
//! assert!(input.get_state());
//!
//! let (mut meter, power) = MockPowerMeter::new();
//! power.set_watts(120.0);
//! assert_eq!(meter.get_power_w(), Ok(120.0));
//! power.set_fail(true);
//! assert!(meter.get_power_w().is_err());
//! ```
//!
//! [`Input`]: crate::traits::Input
//! [`Output`]: crate::traits::Output
//! [`PowerMeter`]: crate::traits::PowerMeter
//! [`Clock`]: crate::traits::Clock
//! [`ConfigStore`]: crate::traits::ConfigStore

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::config::CoveringConfig;
use crate::traits::{Clock, ConfigStore, Input, InputEvent, Output, PowerMeter};

// ============================================================================
// Input
// ============================================================================

#[derive(Debug, Default)]
struct InputShared {
    level: bool,
    events: VecDeque<(InputEvent, bool)>,
}

/// Mock physical input.
///
/// Events are queued through the paired [`InputHandle`] and drained by the
/// controller in FIFO order.
#[derive(Debug)]
pub struct MockInput {
    shared: Arc<Mutex<InputShared>>,
}

/// Test-side handle to a [`MockInput`].
#[derive(Clone, Debug)]
pub struct InputHandle {
    shared: Arc<Mutex<InputShared>>,
}

impl MockInput {
    /// Creates a mock input (level low, no events) and its handle.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (MockInput, InputHandle) {
        let shared = Arc::new(Mutex::new(InputShared::default()));
        (
            MockInput {
                shared: Arc::clone(&shared),
            },
            InputHandle { shared },
        )
    }
}

impl InputHandle {
    /// Sets the debounced level without queueing an event.
    pub fn set_level(&self, level: bool) {
        self.shared.lock().unwrap().level = level;
    }

    /// Queues an event with its post-event level.
    pub fn push_event(&self, ev: InputEvent, level: bool) {
        let mut shared = self.shared.lock().unwrap();
        shared.level = level;
        shared.events.push_back((ev, level));
    }

    /// Simulates a press: level high plus a change event.
    pub fn press(&self) {
        self.push_event(InputEvent::Change, true);
    }

    /// Simulates a release: level low plus a change event.
    pub fn release(&self) {
        self.push_event(InputEvent::Change, false);
    }
}

impl Input for MockInput {
    fn get_state(&self) -> bool {
        self.shared.lock().unwrap().level
    }

    fn poll_event(&mut self) -> Option<(InputEvent, bool)> {
        self.shared.lock().unwrap().events.pop_front()
    }
}

// ============================================================================
// Output
// ============================================================================

#[derive(Debug, Default)]
struct OutputShared {
    on: bool,
    fail: bool,
    history: Vec<(bool, String)>,
}

/// Mock relay output.
///
/// Records every switch with its source string for verification.
#[derive(Debug)]
pub struct MockOutput {
    shared: Arc<Mutex<OutputShared>>,
}

/// Test-side handle to a [`MockOutput`].
#[derive(Clone, Debug)]
pub struct OutputHandle {
    shared: Arc<Mutex<OutputShared>>,
}

impl MockOutput {
    /// Creates a mock output (off) and its handle.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (MockOutput, OutputHandle) {
        let shared = Arc::new(Mutex::new(OutputShared::default()));
        (
            MockOutput {
                shared: Arc::clone(&shared),
            },
            OutputHandle { shared },
        )
    }
}

impl OutputHandle {
    /// Whether the relay is currently energized.
    pub fn is_on(&self) -> bool {
        self.shared.lock().unwrap().on
    }

    /// Makes subsequent `set_state` calls fail.
    pub fn set_fail(&self, fail: bool) {
        self.shared.lock().unwrap().fail = fail;
    }

    /// Every switch so far as `(on, source)` pairs.
    pub fn history(&self) -> Vec<(bool, String)> {
        self.shared.lock().unwrap().history.clone()
    }
}

impl Output for MockOutput {
    type Error = ();

    fn set_state(&mut self, on: bool, source: &str) -> Result<(), ()> {
        let mut shared = self.shared.lock().unwrap();
        if shared.fail {
            return Err(());
        }
        if shared.on != on {
            shared.history.push((on, source.into()));
        }
        shared.on = on;
        Ok(())
    }
}

// ============================================================================
// Power meter
// ============================================================================

#[derive(Debug, Default)]
struct PowerShared {
    watts: f32,
    fail: bool,
}

/// Mock power meter with a settable reading.
#[derive(Debug)]
pub struct MockPowerMeter {
    shared: Arc<Mutex<PowerShared>>,
}

/// Test-side handle to a [`MockPowerMeter`].
#[derive(Clone, Debug)]
pub struct PowerHandle {
    shared: Arc<Mutex<PowerShared>>,
}

impl MockPowerMeter {
    /// Creates a mock meter reading 0 W and its handle.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (MockPowerMeter, PowerHandle) {
        let shared = Arc::new(Mutex::new(PowerShared::default()));
        (
            MockPowerMeter {
                shared: Arc::clone(&shared),
            },
            PowerHandle { shared },
        )
    }
}

impl PowerHandle {
    /// Sets the instantaneous reading.
    pub fn set_watts(&self, watts: f32) {
        self.shared.lock().unwrap().watts = watts;
    }

    /// Makes subsequent reads fail (sensor unavailable).
    pub fn set_fail(&self, fail: bool) {
        self.shared.lock().unwrap().fail = fail;
    }
}

impl PowerMeter for MockPowerMeter {
    type Error = ();

    fn get_power_w(&mut self) -> Result<f32, ()> {
        let shared = self.shared.lock().unwrap();
        if shared.fail {
            Err(())
        } else {
            Ok(shared.watts)
        }
    }
}

// ============================================================================
// Clock
// ============================================================================

/// Mock clock for testing.
///
/// # Example
///
/// ```rust
/// use rs_shades::hal::MockClock;
/// use rs_shades::traits::Clock;
///
/// let mut clock = MockClock::new();
/// clock.advance(250);
/// assert_eq!(clock.now_ms(), 250);
/// ```
#[derive(Debug, Default)]
pub struct MockClock {
    current_ms: u64,
}

impl MockClock {
    /// Creates a new mock clock starting at 0 ms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the current time in milliseconds.
    pub fn set(&mut self, ms: u64) {
        self.current_ms = ms;
    }

    /// Advances the clock by the given duration.
    pub fn advance(&mut self, ms: u64) {
        self.current_ms += ms;
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.current_ms
    }
}

// ============================================================================
// Config store
// ============================================================================

#[derive(Debug, Default)]
struct StoreShared {
    saved: Option<CoveringConfig>,
    save_count: usize,
    fail: bool,
}

/// Mock configuration store.
///
/// Counts saves so tests can verify persistence throttling.
#[derive(Debug)]
pub struct MockConfigStore {
    shared: Arc<Mutex<StoreShared>>,
}

/// Test-side handle to a [`MockConfigStore`].
#[derive(Clone, Debug)]
pub struct StoreHandle {
    shared: Arc<Mutex<StoreShared>>,
}

impl MockConfigStore {
    /// Creates an empty mock store and its handle.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (MockConfigStore, StoreHandle) {
        let shared = Arc::new(Mutex::new(StoreShared::default()));
        (
            MockConfigStore {
                shared: Arc::clone(&shared),
            },
            StoreHandle { shared },
        )
    }
}

impl StoreHandle {
    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.shared.lock().unwrap().save_count
    }

    /// The last saved configuration, if any.
    pub fn saved(&self) -> Option<CoveringConfig> {
        self.shared.lock().unwrap().saved.clone()
    }

    /// Pre-seeds the stored configuration for load tests.
    pub fn seed(&self, cfg: CoveringConfig) {
        self.shared.lock().unwrap().saved = Some(cfg);
    }

    /// Makes subsequent saves and loads fail.
    pub fn set_fail(&self, fail: bool) {
        self.shared.lock().unwrap().fail = fail;
    }
}

impl ConfigStore for MockConfigStore {
    type Error = ();

    fn load(&mut self) -> Result<Option<CoveringConfig>, ()> {
        let shared = self.shared.lock().unwrap();
        if shared.fail {
            Err(())
        } else {
            Ok(shared.saved.clone())
        }
    }

    fn save(&mut self, cfg: &CoveringConfig) -> Result<(), ()> {
        let mut shared = self.shared.lock().unwrap();
        if shared.fail {
            return Err(());
        }
        shared.saved = Some(cfg.clone());
        shared.save_count += 1;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
