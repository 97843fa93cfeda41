//! Central module for application-wide configuration settings.
//!
//! Settings come from `RESERVA_*` environment variables: the API base URL,
//! the token endpoint paths, the HTTP timeout and the refresh policy.

use std::time::Duration;

use reserva_adapters::http::{DEFAULT_LOGOUT_PATH, DEFAULT_REFRESH_PATH};
use thiserror::Error;

use crate::auth::RefreshPolicy;

pub const API_URL_VAR: &str = "RESERVA_API_URL";
pub const REFRESH_PATH_VAR: &str = "RESERVA_REFRESH_PATH";
pub const LOGOUT_PATH_VAR: &str = "RESERVA_LOGOUT_PATH";
pub const REQUEST_TIMEOUT_VAR: &str = "RESERVA_REQUEST_TIMEOUT_SECS";
pub const COALESCE_REFRESH_VAR: &str = "RESERVA_COALESCE_REFRESH";

const DEFAULT_API_URL: &str = "http://localhost:8080/api";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_url: String,
    pub refresh_path: String,
    pub logout_path: String,
    pub request_timeout: Duration,
    pub refresh_policy: RefreshPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            logout_path: DEFAULT_LOGOUT_PATH.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            refresh_policy: RefreshPolicy::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source; unset
    /// variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(API_URL_VAR) {
            let url = url.trim();
            if url.is_empty() {
                return Err(ConfigError::Missing(API_URL_VAR));
            }
            config.api_url = url.to_string();
        }
        if let Some(path) = lookup(REFRESH_PATH_VAR) {
            config.refresh_path = path;
        }
        if let Some(path) = lookup(LOGOUT_PATH_VAR) {
            config.logout_path = path;
        }
        if let Some(raw) = lookup(REQUEST_TIMEOUT_VAR) {
            let secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| invalid(REQUEST_TIMEOUT_VAR, &raw))?;
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = lookup(COALESCE_REFRESH_VAR) {
            let coalesce = parse_flag(&raw).ok_or_else(|| invalid(COALESCE_REFRESH_VAR, &raw))?;
            config.refresh_policy = if coalesce {
                RefreshPolicy::Coalesced
            } else {
                RefreshPolicy::Independent
            };
        }

        Ok(config)
    }
}

fn invalid(key: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
