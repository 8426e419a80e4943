//! API response types for the HTTP RPC surface.

use serde::{Deserialize, Serialize};

// ============================================================================
// Response Types
// ============================================================================

/// API response wrapper for consistent JSON structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data (present when success=true).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error message (present when success=false).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response with data.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response.
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Command result response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Whether the command was accepted.
    pub accepted: bool,
    /// Result details.
    pub result: String,
}

impl CommandResponse {
    /// Accepted command with a detail string.
    pub fn accepted(result: impl Into<String>) -> Self {
        Self {
            accepted: true,
            result: result.into(),
        }
    }

    /// Rejected command with a reason.
    pub fn rejected(result: impl Into<String>) -> Self {
        Self {
            accepted: false,
            result: result.into(),
        }
    }
}

/// Configuration update result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResponse {
    /// The change requires re-initialization or re-homing.
    pub restart_required: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_response_ok_shape() {
        let resp = ApiResponse::ok(42);
        assert!(resp.success);
        assert_eq!(resp.data, Some(42));
        assert!(resp.error.is_none());

        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"success\":true"));
        assert!(!json.contains("error"));
    }

    #[test]
    fn api_response_err_shape() {
        let resp: ApiResponse<()> = ApiResponse::err("nope");
        assert!(!resp.success);
        assert!(resp.data.is_none());
        assert_eq!(resp.error.as_deref(), Some("nope"));

        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("data"));
    }

    #[test]
    fn command_response_constructors() {
        let ok = CommandResponse::accepted("applied");
        assert!(ok.accepted);
        assert_eq!(ok.result, "applied");

        let no = CommandResponse::rejected("invalid state");
        assert!(!no.accepted);
        assert_eq!(no.result, "invalid state");
    }

    #[test]
    fn config_response_roundtrip() {
        let resp = ConfigResponse {
            restart_required: true,
        };
        let json = serde_json::to_string(&resp).unwrap();
        let back: ConfigResponse = serde_json::from_str(&json).unwrap();
        assert!(back.restart_required);
    }
}
