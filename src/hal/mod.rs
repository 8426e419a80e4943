//! Concrete trait implementations.
//!
//! Currently this is the mock layer used for desktop development, the test
//! suite and the simulation binary. Board integrations implement the traits
//! from [`crate::traits`] on top of their own pin and metering drivers.

#[cfg(feature = "std")]
pub mod mock;

#[cfg(feature = "std")]
pub use mock::{
    InputHandle, MockClock, MockConfigStore, MockInput, MockOutput, MockPowerMeter, OutputHandle,
    PowerHandle, StoreHandle,
};
