//! Configuration persistence seam.
//!
//! The covering controller owns its [`CoveringConfig`] value and writes it
//! back through a [`ConfigStore`] at throttle points (movement stop,
//! calibration milestones, shutdown) rather than on every tick. The store
//! behind this trait is typically the board's settings partition; tests use
//! [`crate::hal::MockConfigStore`].
//!
//! [`CoveringConfig`]: crate::CoveringConfig

use crate::config::CoveringConfig;

/// Backing store for the persisted covering configuration.
///
/// Saves are synchronous and assumed fast relative to the 100 ms tick. A
/// failed save must not take the device down: the controller keeps the
/// in-memory value authoritative and retries at the next throttle point.
pub trait ConfigStore {
    /// Error type for store operations.
    type Error;

    /// Loads the persisted configuration, if one exists.
    fn load(&mut self) -> Result<Option<CoveringConfig>, Self::Error>;

    /// Persists the configuration.
    fn save(&mut self, cfg: &CoveringConfig) -> Result<(), Self::Error>;
}
