//! DMX telemetry state engine
//!
//! Reconciles a lossy, unbounded stream of per-universe DMX frames from a
//! monitoring backend into bounded, queryable state:
//! - latest frame per universe
//! - last-nonzero history and decaying activity per channel
//! - windowed time series for up to ten tracked channels
//! - per-universe packet statistics joined with the source list
//! - stateless color resolution and dashboard downsampling for renderers
//!
//! With the `cli` feature, `runtime` runs the engine as a single-owner async
//! actor and `websocket_native` talks to the backend.

pub mod core;
pub mod time;
pub mod ws_state;

#[cfg(feature = "cli")]
pub mod runtime;
#[cfg(feature = "cli")]
pub mod websocket_native;

pub use crate::core::{EngineConfig, TelemetryEngine};
