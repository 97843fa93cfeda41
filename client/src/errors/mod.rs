//! Global application error types.
//!
//! [`ClientError`] is what the `reserva` binary reports: configuration and
//! session problems, adapter errors, and API calls that came back as a
//! failure.

use reserva_adapters::{AdapterError, Failure};
use thiserror::Error;

use crate::auth::{ExecutionError, SessionError};
use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("request failed: {0}")]
    Request(Failure),

    #[error("no active session")]
    NotSignedIn,
}
