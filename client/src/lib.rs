//! Reserva client library.
//!
//! Session-aware access to the Reserva API: the signed-in session and its
//! stores, role-scoped application state, and the executor that refreshes an
//! expired access token once before giving up on the session.

pub mod api;
pub mod auth;
pub mod config;
pub mod errors;
pub mod services;

pub use api::AuthenticatedApi;
pub use auth::{AuthenticatedExecutor, RefreshPolicy, Role, Session, SessionStore};
pub use config::Config;
pub use errors::ClientError;
