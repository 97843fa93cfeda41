//! Custom error types specific to authentication failures.
//!
//! [`SessionError`] is raised by session stores. [`ExecutionError`] is what
//! interrupts an authenticated call; the executor never returns it, it is
//! rendered into an `Unexpected` failure instead.

use std::error::Error as StdError;

use reserva_adapters::AdapterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("session storage holds invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("operation raised an error: {0}")]
    Operation(Box<dyn StdError + Send + Sync>),

    #[error("token refresh raised an error: {0}")]
    Refresh(#[from] AdapterError),

    #[error(transparent)]
    Session(#[from] SessionError),
}
