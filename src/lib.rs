//! # rs-shades
//!
//! A self-calibrating window covering controller for dual-relay motor
//! boards, with physical buttons, home-hub target writes and an RPC surface.
//!
//! ## Features
//!
//! - **Hardware abstraction**: Traits for inputs, relay outputs, power
//!   metering and configuration persistence
//! - **Sensorless positioning**: Position is estimated purely from elapsed
//!   travel time, persisted across reboots
//! - **Self-calibration**: One close-then-open cycle measures the full
//!   traverse time and the motor's reference power draw
//! - **Obstruction detection**: Power anomaly or excess travel time stops
//!   the motor and raises the obstruction characteristic
//! - **Command arbitration**: Separate/toggle/single button wiring modes and
//!   a disambiguation heuristic for hub tile taps that always send a limit
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `traits` - Hardware and persistence abstractions
//! - `config` - Persisted configuration and the validation boundary
//! - `position` - Time-based position estimation math
//! - `arbiter` - Pure command-arbitration decisions
//! - `covering` - Main controller: calibration, movement, notifications
//! - `hal` - Mock implementations for testing and simulation
//! - `services` - Optional HTTP RPC surface (feature `web`)
//!
//! ## Example
//!
//! ```rust
//! use rs_shades::{CoveringConfig, CoveringController, PositionState};
//! use rs_shades::hal::{MockConfigStore, MockInput, MockOutput, MockPowerMeter};
//!
//! // Create a controller with mock hardware, already calibrated.
//! let cfg = CoveringConfig::default()
//!     .with_calibration(20_000, 100.0)
//!     .with_current_pos(50.0);
//! let (in0, _) = MockInput::new();
//! let (in1, _) = MockInput::new();
//! let (out0, relay_open) = MockOutput::new();
//! let (out1, _) = MockOutput::new();
//! let (pm0, _) = MockPowerMeter::new();
//! let (pm1, _) = MockPowerMeter::new();
//! let (store, _) = MockConfigStore::new();
//! let mut covering =
//!     CoveringController::new(cfg, store, [in0, in1], [out0, out1], [pm0, pm1]);
//!
//! // Ask for fully open and run the tick loop.
//! covering.set_target(100.0, "example");
//! covering.tick(100).unwrap();
//! covering.tick(200).unwrap();
//! assert!(relay_open.is_on());
//! assert_eq!(covering.position_state(), PositionState::GoingToMaximum);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// Pure command-arbitration decisions for buttons and hub writes.
pub mod arbiter;
/// Persisted configuration, input modes and the validation boundary.
pub mod config;
/// Main covering controller: state machine, calibration, notifications.
pub mod covering;
/// Concrete trait implementations (mocks for testing and simulation).
pub mod hal;
/// Time-based position estimation math.
pub mod position;
/// Core traits for hardware abstraction and persistence.
pub mod traits;

/// Shared message types for the RPC surface (serde-based).
#[cfg(feature = "serde")]
pub mod messages;

/// Network services for the HTTP RPC surface (feature-gated).
#[cfg(feature = "web")]
pub mod services;

// Re-exports for convenience
pub use config::{ConfigError, ConfigUpdate, CoveringConfig, InputMode};
pub use covering::{
    CoveringController, CoveringInfo, Event, PositionState, State, CLIENT_CONTEXT_TTL_MS, TICK_MS,
};
pub use position::{FULLY_CLOSED, FULLY_OPEN};
pub use traits::{Clock, ConfigStore, Direction, Input, InputEvent, Output, PowerMeter};

// Message re-exports (for the RPC surface)
#[cfg(feature = "serde")]
pub use messages::{SetHoldRequest, SetStateRequest, SetTargetRequest};
