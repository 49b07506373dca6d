//! Volduel Backend Library
//!
//! Parimutuel volatility pool engine plus a deterministic simulator.
//! Exposed for the `volduel` binary and integration tests.

pub mod pool;
pub mod sim;

pub use pool::{EngineConfig, PoolEngine, SharedEngine};
