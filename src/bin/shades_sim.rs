//! Desktop simulation server.
//!
//! Runs the covering controller against mock hardware with a simple motor
//! physics model, and serves the HTTP RPC surface. Useful for poking the
//! state machine from a browser or curl without a relay board:
//!
//! ```sh
//! cargo run --bin shades_sim --features web
//! curl -X POST localhost:8080/api/calibrate
//! curl localhost:8080/api/info
//! curl -X POST localhost:8080/api/target -H 'content-type: application/json' \
//!      -d '{"target_position": 30}'
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use rs_shades::hal::{
    MockConfigStore, MockInput, MockOutput, MockPowerMeter, OutputHandle, PowerHandle,
};
use rs_shades::services::{run_server, run_tick_loop, SharedCovering, WebServerConfig};
use rs_shades::{CoveringConfig, CoveringController, TICK_MS};

/// Simulated full traverse, closed stop to open stop.
const FULL_TRAVEL_MS: u64 = 20_000;

/// Simulated power draw while the motor runs.
const MOVING_POWER_W: f32 = 110.0;

#[tokio::main]
async fn main() -> Result<()> {
    let (in0, _in0h) = MockInput::new();
    let (in1, _in1h) = MockInput::new();
    let (out0, open_relay) = MockOutput::new();
    let (out1, close_relay) = MockOutput::new();
    let (pm0, open_power) = MockPowerMeter::new();
    let (pm1, close_power) = MockPowerMeter::new();
    let (store, _store_handle) = MockConfigStore::new();

    let cfg = CoveringConfig::default().with_name("simulated shade");
    let covering = CoveringController::new(cfg, store, [in0, in1], [out0, out1], [pm0, pm1]);
    let state = Arc::new(SharedCovering::new(covering));

    tokio::spawn(run_tick_loop(Arc::clone(&state), TICK_MS));
    tokio::spawn(simulate_motor(
        open_relay,
        close_relay,
        open_power,
        close_power,
    ));

    println!("Simulated covering: {FULL_TRAVEL_MS} ms traverse, {MOVING_POWER_W} W while moving");
    println!("Start with POST /api/calibrate, then drive /api/target");
    run_server(state, WebServerConfig::default()).await?;
    Ok(())
}

/// Minimal motor physics: travel accumulates while a relay is energized,
/// power flows until the matching end-stop is reached (the simulated motor
/// stops itself at the limits, like the real ones this firmware targets).
async fn simulate_motor(
    open_relay: OutputHandle,
    close_relay: OutputHandle,
    open_power: PowerHandle,
    close_power: PowerHandle,
) {
    let mut travel_ms: u64 = 0;
    let mut interval = tokio::time::interval(Duration::from_millis(TICK_MS));
    loop {
        interval.tick().await;
        if open_relay.is_on() {
            travel_ms = (travel_ms + TICK_MS).min(FULL_TRAVEL_MS);
        }
        if close_relay.is_on() {
            travel_ms = travel_ms.saturating_sub(TICK_MS);
        }
        let opening = open_relay.is_on() && travel_ms < FULL_TRAVEL_MS;
        let closing = close_relay.is_on() && travel_ms > 0;
        open_power.set_watts(if opening { MOVING_POWER_W } else { 0.0 });
        close_power.set_watts(if closing { MOVING_POWER_W } else { 0.0 });
    }
}
