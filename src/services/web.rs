//! Axum-based HTTP server for the covering RPC surface.
//!
//! Provides REST endpoints for:
//! - GET `/api/info` - Diagnostic snapshot
//! - GET `/api/config` - Current configuration
//! - POST `/api/config` - Partial configuration update
//! - POST `/api/target` - Set target position
//! - POST `/api/hold` - Hold the current position
//! - POST `/api/state` - Force a state or set/stop a target (operator surface)
//! - POST `/api/calibrate` - Start a calibration cycle
//! - GET `/` - Minimal status page

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::config::{ConfigUpdate, CoveringConfig};
use crate::covering::CoveringInfo;
use crate::messages::{SetHoldRequest, SetStateRequest, SetTargetRequest};
use crate::position::{FULLY_CLOSED, FULLY_OPEN};
use crate::traits::{ConfigStore, Input, Output, PowerMeter};
use crate::State as CoveringState;

use super::api::{ApiResponse, CommandResponse, ConfigResponse};
use super::shared::SharedCovering;

// ============================================================================
// Route Handlers
// ============================================================================

/// GET /api/info - Returns the diagnostic snapshot
async fn get_info<IN, OUT, PM, ST>(
    State(state): State<Arc<SharedCovering<IN, OUT, PM, ST>>>,
) -> Json<ApiResponse<CoveringInfo>>
where
    IN: Input + Send + 'static,
    OUT: Output + Send + 'static,
    PM: PowerMeter + Send + 'static,
    ST: ConfigStore + Send + 'static,
{
    Json(ApiResponse::ok(state.info()))
}

/// GET /api/config - Returns the active configuration
async fn get_config<IN, OUT, PM, ST>(
    State(state): State<Arc<SharedCovering<IN, OUT, PM, ST>>>,
) -> Json<ApiResponse<CoveringConfig>>
where
    IN: Input + Send + 'static,
    OUT: Output + Send + 'static,
    PM: PowerMeter + Send + 'static,
    ST: ConfigStore + Send + 'static,
{
    let cfg = state.with_covering(|covering| covering.config().clone());
    Json(ApiResponse::ok(cfg))
}

/// POST /api/config - Apply a partial configuration update
///
/// Accepts JSON like: `{"in_mode": 2, "swap_outputs": true}`
async fn set_config<IN, OUT, PM, ST>(
    State(state): State<Arc<SharedCovering<IN, OUT, PM, ST>>>,
    Json(upd): Json<ConfigUpdate>,
) -> Json<ApiResponse<ConfigResponse>>
where
    IN: Input + Send + 'static,
    OUT: Output + Send + 'static,
    PM: PowerMeter + Send + 'static,
    ST: ConfigStore + Send + 'static,
{
    match state.with_covering(|covering| covering.set_config(&upd)) {
        Ok(restart_required) => Json(ApiResponse::ok(ConfigResponse { restart_required })),
        Err(e) => Json(ApiResponse::err(e.to_string())),
    }
}

/// POST /api/target - Set the target position
///
/// Accepts JSON: `{"target_position": 75}`
async fn set_target<IN, OUT, PM, ST>(
    State(state): State<Arc<SharedCovering<IN, OUT, PM, ST>>>,
    Json(req): Json<SetTargetRequest>,
) -> Json<ApiResponse<CommandResponse>>
where
    IN: Input + Send + 'static,
    OUT: Output + Send + 'static,
    PM: PowerMeter + Send + 'static,
    ST: ConfigStore + Send + 'static,
{
    if !(FULLY_CLOSED..=FULLY_OPEN).contains(&req.target_position) {
        return Json(ApiResponse::err("target_position must be between 0 and 100"));
    }
    let now_ms = state.now_ms();
    let result = state
        .with_covering(|covering| covering.set_target_now(req.target_position, "rpc", now_ms));
    match result {
        Ok(()) => Json(ApiResponse::ok(CommandResponse::accepted("target_set"))),
        Err(_) => Json(ApiResponse::err("output error")),
    }
}

/// POST /api/hold - Hold the current position
///
/// Accepts JSON: `{"hold_position": true}`. A `false` write is a no-op,
/// mirroring the accessory characteristic.
async fn hold_position<IN, OUT, PM, ST>(
    State(state): State<Arc<SharedCovering<IN, OUT, PM, ST>>>,
    Json(req): Json<SetHoldRequest>,
) -> Json<ApiResponse<CommandResponse>>
where
    IN: Input + Send + 'static,
    OUT: Output + Send + 'static,
    PM: PowerMeter + Send + 'static,
    ST: ConfigStore + Send + 'static,
{
    if !req.hold_position {
        return Json(ApiResponse::ok(CommandResponse::accepted("ignored")));
    }
    let now_ms = state.now_ms();
    match state.with_covering(|covering| covering.request_hold(now_ms)) {
        Ok(()) => Json(ApiResponse::ok(CommandResponse::accepted("holding"))),
        Err(_) => Json(ApiResponse::err("output error")),
    }
}

/// POST /api/state - Operator surface: force a state and/or drive the target
///
/// Accepts JSON like `{"state": 10}` (force calibration),
/// `{"target_position": 33}` or `{"target_position": -1}` (stop).
async fn set_state<IN, OUT, PM, ST>(
    State(state): State<Arc<SharedCovering<IN, OUT, PM, ST>>>,
    Json(req): Json<SetStateRequest>,
) -> Json<ApiResponse<CommandResponse>>
where
    IN: Input + Send + 'static,
    OUT: Output + Send + 'static,
    PM: PowerMeter + Send + 'static,
    ST: ConfigStore + Send + 'static,
{
    let now_ms = state.now_ms();
    if let Some(code) = req.state {
        let Some(forced) = CoveringState::from_code(code) else {
            return Json(ApiResponse::err(format!("invalid state: {code}")));
        };
        if state
            .with_covering(|covering| covering.force_state(forced, now_ms))
            .is_err()
        {
            return Json(ApiResponse::err("output error"));
        }
    }
    if let Some(target) = req.target_position {
        let result = if target < FULLY_CLOSED {
            state.with_covering(|covering| covering.request_hold(now_ms))
        } else {
            state.with_covering(|covering| covering.set_target_now(target, "rpc", now_ms))
        };
        if result.is_err() {
            return Json(ApiResponse::err("output error"));
        }
    }
    Json(ApiResponse::ok(CommandResponse::accepted("applied")))
}

/// POST /api/calibrate - Start a calibration cycle
async fn calibrate<IN, OUT, PM, ST>(
    State(state): State<Arc<SharedCovering<IN, OUT, PM, ST>>>,
) -> Json<ApiResponse<CommandResponse>>
where
    IN: Input + Send + 'static,
    OUT: Output + Send + 'static,
    PM: PowerMeter + Send + 'static,
    ST: ConfigStore + Send + 'static,
{
    let now_ms = state.now_ms();
    match state.with_covering(|covering| covering.calibrate(now_ms)) {
        Ok(()) => Json(ApiResponse::ok(CommandResponse::accepted("calibrating"))),
        Err(_) => Json(ApiResponse::err("output error")),
    }
}

/// GET / - Minimal status page
async fn index() -> impl IntoResponse {
    Html(
        "<!DOCTYPE html><html><head><title>rs-shades</title></head><body>\
         <h1>rs-shades</h1>\
         <p>Window covering RPC surface. Endpoints: \
         <code>GET /api/info</code>, <code>GET /api/config</code>, \
         <code>POST /api/config</code>, <code>POST /api/target</code>, \
         <code>POST /api/hold</code>, <code>POST /api/state</code>, \
         <code>POST /api/calibrate</code>.</p>\
         </body></html>",
    )
}

/// Fallback handler for 404
async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::err("Not found")),
    )
}

// ============================================================================
// Server Builder
// ============================================================================

/// Configuration for the web server
#[derive(Debug, Clone)]
pub struct WebServerConfig {
    /// Address to bind to
    pub addr: SocketAddr,
    /// Whether to enable CORS for all origins
    pub cors_permissive: bool,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            cors_permissive: true,
        }
    }
}

impl WebServerConfig {
    /// Create a new config with the given address
    pub fn new(addr: impl Into<SocketAddr>) -> Self {
        Self {
            addr: addr.into(),
            ..Default::default()
        }
    }

    /// Set whether CORS should be permissive
    pub fn cors(mut self, permissive: bool) -> Self {
        self.cors_permissive = permissive;
        self
    }
}

/// Build the Axum router with all routes
pub fn build_router<IN, OUT, PM, ST>(
    state: Arc<SharedCovering<IN, OUT, PM, ST>>,
    config: &WebServerConfig,
) -> Router
where
    IN: Input + Send + 'static,
    OUT: Output + Send + 'static,
    PM: PowerMeter + Send + 'static,
    ST: ConfigStore + Send + 'static,
{
    let mut router = Router::new()
        // API routes
        .route("/api/info", get(get_info::<IN, OUT, PM, ST>))
        .route(
            "/api/config",
            get(get_config::<IN, OUT, PM, ST>).post(set_config::<IN, OUT, PM, ST>),
        )
        .route("/api/target", post(set_target::<IN, OUT, PM, ST>))
        .route("/api/hold", post(hold_position::<IN, OUT, PM, ST>))
        .route("/api/state", post(set_state::<IN, OUT, PM, ST>))
        .route("/api/calibrate", post(calibrate::<IN, OUT, PM, ST>))
        // Status page
        .route("/", get(index))
        // Fallback
        .fallback(not_found)
        .with_state(state);

    // Add CORS if requested
    if config.cors_permissive {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router
}

/// Start the web server with shared state.
///
/// This function blocks until the server is shut down. Run the tick loop
/// (see [`run_tick_loop`](super::shared::run_tick_loop)) as a sibling task,
/// otherwise the state machine never advances.
pub async fn run_server<IN, OUT, PM, ST>(
    state: Arc<SharedCovering<IN, OUT, PM, ST>>,
    config: WebServerConfig,
) -> Result<(), std::io::Error>
where
    IN: Input + Send + 'static,
    OUT: Output + Send + 'static,
    PM: PowerMeter + Send + 'static,
    ST: ConfigStore + Send + 'static,
{
    let router = build_router(Arc::clone(&state), &config);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    println!("Web server listening on http://{}", config.addr);

    axum::serve(listener, router).await
}
