//! Hardware abstraction traits for inputs, relay outputs and power metering.
//!
//! This module defines the hardware interfaces that allow rs-shades to run
//! across different platforms (relay boards, desktop mocks, simulations).
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`Input`] | Debounced wall button / switch with discrete events |
//! | [`Output`] | Relay (or PWM-capable) actuator channel |
//! | [`PowerMeter`] | Instantaneous active power for one electrical channel |
//! | [`Clock`] | Time source for `no_std` environments |
//!
//! # Implementation
//!
//! For testing and desktop development, use the mock implementations from
//! [`crate::hal::mock`]. Pin-level drivers and metering-chip protocols live
//! outside this crate; a board integration implements these traits on top
//! of its own driver layer.
//!
//! # Example
//!
//! ```rust
//! use rs_shades::traits::{Output, PowerMeter};
//! use rs_shades::hal::{MockOutput, MockPowerMeter};
//!
//! let (mut relay, handle) = MockOutput::new();
//! relay.set_state(true, "demo").unwrap();
//! assert!(handle.is_on());
//!
//! let (mut meter, power) = MockPowerMeter::new();
//! power.set_watts(96.5);
//! assert_eq!(meter.get_power_w().unwrap(), 96.5);
//! ```

/// Direction of covering travel.
///
/// `Open` drives toward the fully-open limit (position 100), `Close` toward
/// fully closed (position 0). The relay pair is mutually exclusive: at most
/// one direction is ever energized.
///
/// # Default
///
/// Defaults to [`None`](Self::None) (both relays off) for safety.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    /// Moving toward the fully-open limit.
    Open,
    /// Moving toward the fully-closed limit.
    Close,
    /// Not moving (both relays de-energized).
    #[default]
    None,
}

impl Direction {
    /// Returns the direction as a lowercase string.
    ///
    /// # Examples
    ///
    /// ```
    /// use rs_shades::Direction;
    ///
    /// assert_eq!(Direction::Open.as_str(), "open");
    /// assert_eq!(Direction::Close.as_str(), "close");
    /// assert_eq!(Direction::None.as_str(), "none");
    /// ```
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Direction::Open => "open",
            Direction::Close => "close",
            Direction::None => "none",
        }
    }
}

/// Discrete events produced by a debounced input.
///
/// `Change` fires on every level transition; the press-pattern events are
/// produced by the input driver's own timing logic. Every event carries the
/// post-event level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum InputEvent {
    /// Level changed (press or release).
    Change,
    /// Single short press.
    Single,
    /// Double press.
    Double,
    /// Long press.
    Long,
}

impl InputEvent {
    /// Returns the event name as a lowercase string.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            InputEvent::Change => "change",
            InputEvent::Single => "single",
            InputEvent::Double => "double",
            InputEvent::Long => "long",
        }
    }
}

/// Physical input trait - a debounced wall button or switch.
///
/// The driver behind this trait owns debouncing and press-pattern detection.
/// Events accumulate in the driver and are consumed by the controller once
/// per tick via [`poll_event`](Self::poll_event); this keeps all state
/// mutation on the single control thread instead of in interrupt context.
///
/// # Implementation Notes
///
/// - `poll_event()` drains one queued event per call, oldest first
/// - The level reported with an event is the level *after* the event
/// - Inversion (normally-closed switches) is applied by the implementation
pub trait Input {
    /// Returns the current debounced level.
    fn get_state(&self) -> bool;

    /// Returns the next queued event with its post-event level, if any.
    fn poll_event(&mut self) -> Option<(InputEvent, bool)>;
}

/// Relay output trait - one actuator channel.
///
/// # Implementation Notes
///
/// - The `source` string identifies what requested the change; drivers
///   typically pass it through to their own diagnostics
/// - Output inversion is applied by the implementation, never the caller
///
/// # Example Implementation
///
/// ```rust,ignore
/// use rs_shades::traits::Output;
///
/// struct RelayPin { /* pin handle */ }
///
/// impl Output for RelayPin {
///     type Error = PinError;
///
///     fn set_state(&mut self, on: bool, source: &str) -> Result<(), PinError> {
///         // drive the pin, honoring the configured invert flag
///         Ok(())
///     }
/// }
/// ```
pub trait Output {
    /// Error type for output operations.
    type Error;

    /// Energize or de-energize the channel.
    fn set_state(&mut self, on: bool, source: &str) -> Result<(), Self::Error>;
}

/// Power meter trait - instantaneous active power for one channel.
///
/// Reads may fail (metering chip busy or unreachable); the controller treats
/// a failed read as fatal to the current movement or calibration attempt,
/// never as something to retry inline.
pub trait PowerMeter {
    /// Error type for meter reads.
    type Error;

    /// Returns the instantaneous active power in watts.
    fn get_power_w(&mut self) -> Result<f32, Self::Error>;
}

/// Time source trait for `no_std` compatibility.
///
/// Provides monotonic time in milliseconds for tick scheduling. On desktop
/// this can wrap `std::time::Instant`; on embedded, a hardware timer.
///
/// # Example
///
/// ```rust
/// use rs_shades::traits::Clock;
/// use rs_shades::hal::MockClock;
///
/// let mut clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.advance(100);
/// assert_eq!(clock.now_ms(), 100);
/// ```
pub trait Clock {
    /// Returns current time in milliseconds since an arbitrary epoch.
    ///
    /// Must be monotonically increasing.
    fn now_ms(&self) -> u64;
}
