//! Core `adapters` crate for talking to the Reserva API.
//!
//! This crate defines the [`AuthApi`] trait, which outlines the token
//! operations the client needs from the server, the uniform
//! [`OperationResult`] every call resolves to, and the reqwest-backed
//! implementations in [`http`].

pub mod errors;
pub mod http;
pub mod models;

use async_trait::async_trait;

pub use errors::{AdapterError, Result};
pub use http::{ApiClient, HttpAuthApi};
pub use models::{ErrorKind, Failure, FailureClass, OperationResult, TOKEN_EXPIRED_CODE};

/// Token endpoints of the API.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchanges a refresh token for a new access token. A success without a
    /// token means the server had nothing to hand out.
    async fn refresh(&self, refresh_token: &str) -> Result<OperationResult<Option<String>>>;

    /// Invalidates the given token pair on the server.
    async fn logout(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<OperationResult<()>>;
}
