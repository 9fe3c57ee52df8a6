//! Engine error types.

use std::time::Duration;

use thiserror::Error;

/// Request or connection failure below the payload level.
///
/// Recorded and logged by the sessions; the next tick or frame retries naturally.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("channel closed")]
    Closed,
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

/// Errors surfaced by the engine.
///
/// `Decode` never escapes a session (the unit is counted and dropped). `Startup` and
/// `InvalidTask` fail only the current run.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("startup failed: {0}")]
    Startup(String),
    #[error("invalid task: {0}")]
    InvalidTask(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Decode(e.to_string())
    }
}
