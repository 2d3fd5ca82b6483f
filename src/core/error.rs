//! Error types for the backend transport and configuration loading
//!
//! Nothing in the state engine itself is fallible: unknown universes and
//! channels read as `None`, malformed frames are normalised. Errors only
//! exist at the I/O edges.

use thiserror::Error;

/// Failure talking to the backend collaborator
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to connect to backend: {0}")]
    Connect(String),
    #[error("backend connection closed")]
    Closed,
    #[error("backend returned an error: {0}")]
    Remote(String),
    #[error("failed to decode backend payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("socket error: {0}")]
    Socket(String),
}

/// Failure loading or validating an `EngineConfig`
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}
