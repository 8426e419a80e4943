//! Unified shared state for all covering services.
//!
//! `SharedCovering` provides thread-safe access to a single
//! `CoveringController` shared between the web service, the tick loop and
//! any embedding code (e.g. an accessory bridge).
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use rs_shades::services::SharedCovering;
//!
//! let state = Arc::new(SharedCovering::new(covering));
//!
//! // Web handlers use state.info() for reads
//! let snapshot = state.info();
//!
//! // Commands go through the closure API
//! let now = state.now_ms();
//! state.with_covering(|covering| covering.set_target_now(75.0, "rpc", now));
//! ```

use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::covering::{CoveringController, CoveringInfo, Event};
use crate::traits::{ConfigStore, Input, Output, PowerMeter};

/// Unified shared state for all services.
///
/// Wraps a single `CoveringController` and provides thread-safe access.
/// All services share the same instance, so physical inputs, the hub and
/// the RPC surface always see one consistent state.
///
/// # Thread Safety
///
/// A plain `Mutex` (not `RwLock`): the 100 ms tick loop writes constantly,
/// so reader/writer separation buys nothing here. The closure API keeps
/// lock scopes short and prevents holding the guard across await points.
pub struct SharedCovering<IN, OUT, PM, ST>
where
    IN: Input,
    OUT: Output,
    PM: PowerMeter,
    ST: ConfigStore,
{
    covering: Mutex<CoveringController<IN, OUT, PM, ST>>,
    start_time: Instant,
}

impl<IN, OUT, PM, ST> SharedCovering<IN, OUT, PM, ST>
where
    IN: Input,
    OUT: Output,
    PM: PowerMeter,
    ST: ConfigStore,
{
    /// Create new shared state wrapping a controller.
    ///
    /// The creation instant becomes the time base for all `now_ms()` calls
    /// across every service sharing this state.
    pub fn new(covering: CoveringController<IN, OUT, PM, ST>) -> Self {
        Self {
            covering: Mutex::new(covering),
            start_time: Instant::now(),
        }
    }

    /// Current timestamp in milliseconds since state creation.
    #[inline]
    pub fn now_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Access the controller with a mutable lock.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let now = state.now_ms();
    /// state.with_covering(|covering| covering.request_hold(now));
    /// ```
    pub fn with_covering<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut CoveringController<IN, OUT, PM, ST>) -> R,
    {
        let mut guard = self.covering.lock().unwrap();
        f(&mut guard)
    }

    /// Get a diagnostic snapshot (brief lock).
    pub fn info(&self) -> CoveringInfo {
        self.covering.lock().unwrap().info()
    }

    /// Drain pending characteristic change notifications.
    ///
    /// Intended for the accessory bridge; each event is delivered once.
    pub fn drain_events(&self) -> Vec<Event> {
        self.covering.lock().unwrap().drain_events()
    }
}

/// Drive the controller's state machine at a fixed period.
///
/// Runs forever; spawn it as a task next to the web server. Relay errors
/// are reported and the loop keeps going, matching the device behavior of
/// retrying on the next tick.
pub async fn run_tick_loop<IN, OUT, PM, ST>(
    state: Arc<SharedCovering<IN, OUT, PM, ST>>,
    period_ms: u64,
) where
    IN: Input,
    OUT: Output,
    PM: PowerMeter,
    ST: ConfigStore,
    OUT::Error: std::fmt::Debug,
{
    let mut interval = tokio::time::interval(std::time::Duration::from_millis(period_ms));
    loop {
        interval.tick().await;
        let now = state.now_ms();
        if let Err(e) = state.with_covering(|covering| covering.tick(now)) {
            eprintln!("covering tick error: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoveringConfig;
    use crate::hal::{MockConfigStore, MockInput, MockOutput, MockPowerMeter};
    use crate::State;

    fn shared() -> SharedCovering<MockInput, MockOutput, MockPowerMeter, MockConfigStore> {
        let cfg = CoveringConfig::default()
            .with_calibration(20_000, 100.0)
            .with_current_pos(50.0);
        let (in0, _) = MockInput::new();
        let (in1, _) = MockInput::new();
        let (out0, _) = MockOutput::new();
        let (out1, _) = MockOutput::new();
        let (pm0, _) = MockPowerMeter::new();
        let (pm1, _) = MockPowerMeter::new();
        let (store, _) = MockConfigStore::new();
        SharedCovering::new(CoveringController::new(
            cfg,
            store,
            [in0, in1],
            [out0, out1],
            [pm0, pm1],
        ))
    }

    #[test]
    fn shared_state_creation() {
        let state = shared();
        assert!(state.now_ms() < 100);
        assert_eq!(state.info().state, State::Idle.code());
    }

    #[test]
    fn with_covering_access() {
        let state = shared();
        state.with_covering(|c| {
            assert_eq!(c.current_position(), 50.0);
        });
    }

    #[test]
    fn events_drain_once() {
        let state = shared();
        state.with_covering(|c| c.set_target(80.0, "test"));
        assert_eq!(state.drain_events().len(), 1);
        assert!(state.drain_events().is_empty());
    }

    #[test]
    fn concurrent_access() {
        use std::thread;

        let state = Arc::new(shared());
        let s1 = Arc::clone(&state);
        let s2 = Arc::clone(&state);

        let writer = thread::spawn(move || {
            for i in 0..10 {
                let now = s1.now_ms();
                let _ = s1.with_covering(|c| c.set_target_now(i as f32 * 10.0, "rpc", now));
            }
        });
        let reader = thread::spawn(move || {
            for _ in 0..10 {
                let _ = s2.info();
                let _ = s2.drain_events();
            }
        });

        writer.join().unwrap();
        reader.join().unwrap();
        let _ = state.info();
    }
}
