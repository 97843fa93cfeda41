//! Authentication module for managing the signed-in session and authenticated calls.
//!
//! This module provides the session model and stores, and the executor that
//! runs API calls with the current access token, refreshing it once when the
//! API reports it expired.

pub mod errors;
pub mod middleware;
pub mod models;
pub mod service;

// Re-exports for convenience
pub use errors::*;
pub use middleware::*;
pub use models::*;
pub use service::*;
