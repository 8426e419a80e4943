//! Shared message types for the RPC surface.
//!
//! These types are `no_std` compatible and can be deserialized using either
//! `serde_json` (desktop) or `serde-json-core` (embedded).
//!
//! # Example
//!
//! ```
//! use rs_shades::messages::SetStateRequest;
//!
//! let json = r#"{"state": 10}"#;
//! let req: SetStateRequest = serde_json::from_str(json).unwrap();
//! assert_eq!(req.state, Some(10));
//! assert_eq!(req.target_position, None);
//! ```

use serde::{Deserialize, Serialize};

pub use crate::config::ConfigUpdate;

// ============================================================================
// Request Types
// ============================================================================

/// Request to set the target position.
///
/// # JSON Example
///
/// ```json
/// {"target_position": 75}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetTargetRequest {
    /// Target position (0 = fully closed, 100 = fully open).
    pub target_position: f32,
}

impl SetTargetRequest {
    /// Create a new target request.
    pub fn new(target_position: f32) -> Self {
        Self { target_position }
    }
}

/// Request to force the state machine or set a target (operator surface).
///
/// `state` takes a stable state code (see [`State::code`]); it is how an
/// operator starts a calibration cycle or requests a stop. A negative
/// `target_position` means "stop where you are".
///
/// # JSON Examples
///
/// ```json
/// {"state": 10}
/// {"target_position": 33}
/// {"target_position": -1}
/// ```
///
/// [`State::code`]: crate::State::code
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetStateRequest {
    /// State code to force, if any.
    pub state: Option<i32>,
    /// Target position; negative requests a stop.
    pub target_position: Option<f32>,
}

/// Request to hold the current position.
///
/// Mirrors the accessory surface's write-only hold characteristic: only a
/// `true` write does anything.
///
/// # JSON Example
///
/// ```json
/// {"hold_position": true}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetHoldRequest {
    /// True queues a stop at the next state machine pass.
    pub hold_position: bool,
}

// ============================================================================
// Embedded parsing helpers (serde-json-core)
// ============================================================================

/// Parse a [`SetTargetRequest`] from raw JSON bytes.
///
/// Uses `serde-json-core` for allocation-free embedded parsing.
#[cfg(feature = "serde-json-core")]
pub fn parse_target_request(json: &[u8]) -> Option<SetTargetRequest> {
    serde_json_core::from_slice(json).ok().map(|(req, _)| req)
}

/// Parse a [`SetStateRequest`] from raw JSON bytes.
#[cfg(feature = "serde-json-core")]
pub fn parse_state_request(json: &[u8]) -> Option<SetStateRequest> {
    serde_json_core::from_slice(json).ok().map(|(req, _)| req)
}

/// Parse a [`SetHoldRequest`] from raw JSON bytes.
#[cfg(feature = "serde-json-core")]
pub fn parse_hold_request(json: &[u8]) -> Option<SetHoldRequest> {
    serde_json_core::from_slice(json).ok().map(|(req, _)| req)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_request_roundtrip() {
        let req = SetTargetRequest::new(62.5);
        let json = serde_json::to_string(&req).unwrap();
        let back: SetTargetRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(req, back);
    }

    #[test]
    fn state_request_defaults() {
        let req: SetStateRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req, SetStateRequest::default());

        let req: SetStateRequest = serde_json::from_str(r#"{"state": 100}"#).unwrap();
        assert_eq!(req.state, Some(100));
        assert_eq!(req.target_position, None);
    }

    #[test]
    fn state_request_stop_sentinel() {
        let req: SetStateRequest =
            serde_json::from_str(r#"{"target_position": -1}"#).unwrap();
        assert_eq!(req.target_position, Some(-1.0));
    }

    #[test]
    fn hold_request_parses() {
        let req: SetHoldRequest =
            serde_json::from_str(r#"{"hold_position": true}"#).unwrap();
        assert!(req.hold_position);
    }

    #[test]
    fn config_update_partial_json() {
        let upd: ConfigUpdate =
            serde_json::from_str(r#"{"in_mode": 2, "swap_outputs": true}"#).unwrap();
        assert_eq!(upd.in_mode, Some(2));
        assert_eq!(upd.swap_outputs, Some(true));
        assert_eq!(upd.name, None);
        assert_eq!(upd.move_time_ms, None);
    }

    #[cfg(feature = "serde-json-core")]
    mod embedded {
        use super::*;

        #[test]
        fn parse_target_from_slice() {
            let req = parse_target_request(br#"{"target_position": 25}"#).unwrap();
            assert_eq!(req.target_position, 25.0);
            assert!(parse_target_request(b"not json").is_none());
        }

        #[test]
        fn parse_state_from_slice() {
            let req = parse_state_request(br#"{"state": 24}"#).unwrap();
            assert_eq!(req.state, Some(24));
        }

        #[test]
        fn parse_hold_from_slice() {
            let req = parse_hold_request(br#"{"hold_position": true}"#).unwrap();
            assert!(req.hold_position);
        }
    }
}
