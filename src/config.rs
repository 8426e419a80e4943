//! Persisted covering configuration and the configuration boundary.
//!
//! Uses `heapless::String` for `no_std` compatibility while remaining
//! ergonomic to use on desktop with `std`.
//!
//! # Example
//!
//! ```rust
//! use rs_shades::config::{CoveringConfig, InputMode};
//!
//! // Use defaults
//! let cfg = CoveringConfig::default();
//! assert!(!cfg.is_calibrated());
//!
//! // Or customize
//! let cfg = CoveringConfig::default()
//!     .with_name("living room")
//!     .with_in_mode(InputMode::Single)
//!     .with_calibration(21_500, 118.0);
//! assert!(cfg.is_calibrated());
//! ```

use core::fmt;

use heapless::String as HString;

/// Maximum length for the covering name.
pub const MAX_NAME_LEN: usize = 64;

/// Type alias for short config strings.
pub type ShortString = HString<MAX_NAME_LEN>;

/// Create a ShortString from a &str, truncating if too long.
pub fn short_string(s: &str) -> ShortString {
    let mut hs = ShortString::new();
    let take = s.len().min(MAX_NAME_LEN);
    // Find valid UTF-8 boundary
    let valid_end = s
        .char_indices()
        .take_while(|(i, _)| *i < take)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let _ = hs.push_str(&s[..valid_end]);
    hs
}

// ============================================================================
// Input Mode
// ============================================================================

/// How the physical inputs are wired and interpreted.
///
/// The numeric codes are part of the RPC surface and must stay stable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum InputMode {
    /// Two momentary buttons, one per direction.
    #[default]
    SeparateMomentary = 0,
    /// Two toggle switches, one per direction; releasing a switch while
    /// moving in its direction stops the movement.
    SeparateToggle = 1,
    /// One button cycling open - stop - close - stop.
    Single = 2,
    /// Inputs are ignored by the covering.
    Detached = 3,
}

impl InputMode {
    /// Returns the stable numeric code for the RPC surface.
    #[inline]
    pub const fn code(&self) -> u8 {
        *self as u8
    }

    /// Parses a numeric code from the RPC surface.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(InputMode::SeparateMomentary),
            1 => Some(InputMode::SeparateToggle),
            2 => Some(InputMode::Single),
            3 => Some(InputMode::Detached),
            _ => None,
        }
    }
}

// ============================================================================
// Covering Config
// ============================================================================

/// Persisted configuration of one covering channel pair.
///
/// The controller owns a copy and writes it back through a
/// [`ConfigStore`](crate::traits::ConfigStore) at throttle points.
/// `current_pos` rides along so the position estimate survives reboots.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoveringConfig {
    /// Human-readable name.
    pub name: ShortString,
    /// Input wiring mode.
    pub in_mode: InputMode,
    /// Swap which physical input means open/close.
    pub swap_inputs: bool,
    /// Swap which relay (and power channel) means open/close.
    pub swap_outputs: bool,
    /// True once a power-measured calibration cycle completed.
    pub calibrated: bool,
    /// True when the operator supplied traverse times by hand.
    pub manually_calibrated: bool,
    /// Full-traverse duration in milliseconds (measured or operator-supplied).
    pub move_time_ms: u32,
    /// Traverse time used for the final approach to a limit when manually
    /// calibrated; 0 falls back to `move_time_ms`. Only valid for motors
    /// that stop themselves at the end-stops.
    pub move_time_limit_pos_ms: u32,
    /// Reference active power while moving, in watts (from calibration).
    pub move_power: f32,
    /// Below this the motor is considered idle, in watts.
    pub idle_power_thr: f32,
    /// Upper bound on the motor acceleration phase.
    pub max_ramp_up_time_ms: u32,
    /// Last estimated position, 0 (closed) to 100 (open).
    pub current_pos: f32,
}

impl Default for CoveringConfig {
    fn default() -> Self {
        Self {
            name: short_string("shade"),
            in_mode: InputMode::SeparateMomentary,
            swap_inputs: false,
            swap_outputs: false,
            calibrated: false,
            manually_calibrated: false,
            move_time_ms: 0,
            move_time_limit_pos_ms: 0,
            move_power: 0.0,
            idle_power_thr: 2.0,
            max_ramp_up_time_ms: 1500,
            current_pos: 0.0,
        }
    }
}

impl CoveringConfig {
    /// Calibration data is trusted when either method completed.
    #[inline]
    pub fn is_calibrated(&self) -> bool {
        self.calibrated || self.manually_calibrated
    }

    /// Set the covering name.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = short_string(name);
        self
    }

    /// Set the input wiring mode.
    pub fn with_in_mode(mut self, mode: InputMode) -> Self {
        self.in_mode = mode;
        self
    }

    /// Set the input swap flag.
    pub fn with_swap_inputs(mut self, swap: bool) -> Self {
        self.swap_inputs = swap;
        self
    }

    /// Set the output swap flag.
    pub fn with_swap_outputs(mut self, swap: bool) -> Self {
        self.swap_outputs = swap;
        self
    }

    /// Mark the covering as power-calibrated with the given results.
    pub fn with_calibration(mut self, move_time_ms: u32, move_power: f32) -> Self {
        self.calibrated = true;
        self.manually_calibrated = false;
        self.move_time_ms = move_time_ms;
        self.move_power = move_power;
        self
    }

    /// Mark the covering as manually calibrated with operator-supplied times.
    pub fn with_manual_calibration(mut self, move_time_ms: u32, limit_pos_ms: u32) -> Self {
        self.manually_calibrated = true;
        self.calibrated = false;
        self.move_time_ms = move_time_ms;
        self.move_time_limit_pos_ms = limit_pos_ms;
        self
    }

    /// Set the idle power threshold in watts.
    pub fn with_idle_power_thr(mut self, watts: f32) -> Self {
        self.idle_power_thr = watts;
        self
    }

    /// Set the maximum ramp-up time.
    pub fn with_max_ramp_up_time_ms(mut self, ms: u32) -> Self {
        self.max_ramp_up_time_ms = ms;
        self
    }

    /// Set the persisted position estimate.
    pub fn with_current_pos(mut self, pos: f32) -> Self {
        self.current_pos = pos;
        self
    }

    /// Apply an operator update, validating before mutating anything.
    ///
    /// Returns `true` when the change requires re-initialization or
    /// re-homing (wiring mode or swap changes, calibration mode changes).
    /// On error no field is modified.
    pub fn apply_update(&mut self, upd: &ConfigUpdate) -> Result<bool, ConfigError> {
        // Validate.
        let in_mode = match upd.in_mode {
            Some(code) => Some(InputMode::from_code(code).ok_or(ConfigError::InvalidInMode(code))?),
            None => None,
        };
        if upd.move_time_ms == Some(0) {
            return Err(ConfigError::InvalidMoveTime);
        }
        // Apply.
        let mut restart = false;
        if let Some(name) = &upd.name {
            if *name != self.name {
                self.name = name.clone();
                restart = true;
            }
        }
        if let Some(mode) = in_mode {
            if mode != self.in_mode {
                self.in_mode = mode;
                restart = true;
            }
        }
        if let Some(swap) = upd.swap_inputs {
            if swap != self.swap_inputs {
                self.swap_inputs = swap;
                restart = true;
            }
        }
        if let Some(swap) = upd.swap_outputs {
            if swap != self.swap_outputs {
                self.swap_outputs = swap;
                // Travel direction is now reversed, so the position estimate
                // and the measured calibration no longer hold.
                self.calibrated = false;
                restart = true;
            }
        }
        if let Some(manual) = upd.manual_calibration {
            if manual != self.manually_calibrated {
                self.manually_calibrated = manual;
                if manual {
                    self.calibrated = false;
                }
                restart = true;
            }
        }
        if let Some(ms) = upd.move_time_ms {
            self.move_time_ms = ms;
        }
        if let Some(ms) = upd.move_time_limit_pos_ms {
            self.move_time_limit_pos_ms = ms;
        }
        Ok(restart)
    }
}

// ============================================================================
// Config Update
// ============================================================================

/// Partial configuration update from the operator surface.
///
/// Absent fields leave the current value untouched. The name length bound
/// is enforced by the `heapless` type at the deserialization boundary.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConfigUpdate {
    /// New covering name.
    pub name: Option<ShortString>,
    /// New input mode as its numeric code.
    pub in_mode: Option<u8>,
    /// Enable or disable manual calibration. Enabling clears `calibrated`.
    pub manual_calibration: Option<bool>,
    /// Full-traverse time for manual calibration; must be nonzero.
    pub move_time_ms: Option<u32>,
    /// Limit-approach traverse time for manual calibration.
    pub move_time_limit_pos_ms: Option<u32>,
    /// Swap which physical input means open/close.
    pub swap_inputs: Option<bool>,
    /// Swap which relay means open/close. Clears `calibrated`.
    pub swap_outputs: Option<bool>,
}

/// Errors rejected synchronously at the configuration boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ConfigError {
    /// Unknown input mode code.
    InvalidInMode(u8),
    /// Zero traverse time.
    InvalidMoveTime,
    /// Unknown state code in a forced-state request.
    InvalidState(i32),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidInMode(code) => write!(f, "invalid in_mode: {code}"),
            ConfigError::InvalidMoveTime => write!(f, "invalid move_time_ms: must be nonzero"),
            ConfigError::InvalidState(code) => write!(f, "invalid state: {code}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

// ============================================================================
// Tests
// ============================================================================
