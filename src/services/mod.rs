//! Network services for the HTTP RPC surface.
//!
//! This module provides optional connectivity for the covering controller:
//! an Axum-based HTTP API with JSON endpoints for diagnostics, target
//! writes, hold requests, forced states, configuration and calibration.
//!
//! The accessory bridge itself consumes the controller's characteristic
//! surface (getters plus [`drain_events`]) directly and is not part of this
//! crate; the HTTP surface here is the operator/diagnostic RPC channel.
//!
//! # Shared State Pattern
//!
//! All access goes through a single [`SharedCovering`] wrapped in `Arc`, so
//! the web handlers and the tick loop mutate one controller under one lock:
//!
//! ```ignore
//! use std::sync::Arc;
//! use rs_shades::services::{build_router, run_tick_loop, SharedCovering, WebServerConfig};
//!
//! let state = Arc::new(SharedCovering::new(covering));
//! let router = build_router(Arc::clone(&state), &WebServerConfig::default());
//! tokio::spawn(run_tick_loop(Arc::clone(&state), rs_shades::TICK_MS));
//! ```
//!
//! [`drain_events`]: crate::CoveringController::drain_events

pub mod api;
pub mod shared;
pub mod web;

// Re-exports
pub use api::*;
pub use shared::*;
pub use web::*;
