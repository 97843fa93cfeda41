//! Custom error types specific to the `adapters` crate.
//!
//! These are the errors raised while talking to the API: the request never
//! produced a response, or the response could not be decoded. An API that
//! answers with an error payload is not an `AdapterError`; that outcome is a
//! [`Failure`](crate::models::Failure) inside an
//! [`OperationResult`](crate::models::OperationResult).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("cannot decode response body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, AdapterError>;
