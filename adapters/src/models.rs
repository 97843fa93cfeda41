//! Generic data models for the `adapters` crate.
//!
//! Every API call resolves to an [`OperationResult`]: either the decoded
//! payload or a [`Failure`] describing what the API reported. The
//! [`ApiEnvelope`] is the JSON shape the Reserva API wraps its responses in.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

/// Sub-code the API attaches to a `403` when the access token is expired or invalid.
pub const TOKEN_EXPIRED_CODE: i64 = 9;

#[derive(Debug, Clone, PartialEq)]
pub enum OperationResult<T> {
    Success(T),
    Failure(Failure),
}

impl<T> OperationResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> OperationResult<U> {
        match self {
            Self::Success(value) => OperationResult::Success(f(value)),
            Self::Failure(failure) => OperationResult::Failure(failure),
        }
    }

    pub fn into_result(self) -> Result<T, Failure> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(failure) => Err(failure),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Server,
    /// Any other error the API reported.
    Api,
    /// Raised locally while executing the call; never reported by the API.
    Unexpected,
}

impl ErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            500..=599 => Self::Server,
            _ => Self::Api,
        }
    }
}

/// Coarse classification used when deciding how to react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The access token was rejected; a refresh may recover.
    AuthorizationExpired,
    OtherApiError,
    Unexpected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
    /// Domain sub-code reported by the API, if any.
    pub code: Option<i64>,
    pub status: Option<u16>,
    pub timestamp: Option<String>,
    /// Rendered source error for `Unexpected` failures.
    pub cause: Option<String>,
}

impl Failure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
            status: None,
            timestamp: None,
            cause: None,
        }
    }

    pub fn unexpected(cause: impl fmt::Display) -> Self {
        let cause = cause.to_string();
        Self {
            message: format!("unexpected error: {cause}"),
            cause: Some(cause),
            ..Self::new(ErrorKind::Unexpected, String::new())
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_token_expired(&self) -> bool {
        self.kind == ErrorKind::Forbidden && self.code == Some(TOKEN_EXPIRED_CODE)
    }

    pub fn class(&self) -> FailureClass {
        if self.kind == ErrorKind::Unexpected {
            FailureClass::Unexpected
        } else if self.is_token_expired() {
            FailureClass::AuthorizationExpired
        } else {
            FailureClass::OtherApiError
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(status) = self.status {
            write!(f, " ({status})")?;
        }
        if let Some(code) = self.code {
            write!(f, " [code {code}]")?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for Failure {}

/// Response wrapper used by the Reserva API.
///
/// Only bodies that carry an `isError` key are treated as envelopes; anything
/// else is decoded as the bare payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
    pub is_error: bool,
    #[serde(default, deserialize_with = "lenient::exception")]
    pub exception: Option<ApiException>,
}

/// Error details attached to a failed envelope.
///
/// Each field is read on its own; a value of an unexpected JSON type is
/// dropped instead of failing the whole envelope, so `code` survives a
/// backend that sends, say, an epoch-millis `timestamp`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiException {
    #[serde(default, deserialize_with = "lenient::integer")]
    pub code: Option<i64>,
    #[serde(default, deserialize_with = "lenient::status")]
    pub status: Option<u16>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub timestamp: Option<String>,
}

mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::ApiException;

    fn value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
        Option::<Value>::deserialize(deserializer)
    }

    fn as_integer(value: &Value) -> Option<i64> {
        match value {
            Value::Number(number) => number.as_i64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(value(deserializer)?.as_ref().and_then(as_integer))
    }

    pub fn status<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(value(deserializer)?
            .as_ref()
            .and_then(as_integer)
            .and_then(|status| u16::try_from(status).ok()))
    }

    pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(value(deserializer)?.and_then(|value| match value {
            Value::Null => None,
            Value::String(text) => Some(text),
            other => Some(other.to_string()),
        }))
    }

    pub fn exception<'de, D>(deserializer: D) -> Result<Option<ApiException>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(value(deserializer)?.and_then(|value| match value {
            Value::Object(_) => serde_json::from_value(value).ok(),
            _ => None,
        }))
    }
}

impl ApiEnvelope {
    pub fn is_failure(&self, http_status: u16) -> bool {
        self.is_error || self.exception.is_some() || !(200..300).contains(&http_status)
    }

    /// Builds the failure this envelope reports, falling back to the HTTP status
    /// when the exception block omits one.
    pub fn into_failure(self, http_status: u16) -> Failure {
        let exception = self.exception.unwrap_or_default();
        let status = exception.status.unwrap_or(http_status);
        let message = exception
            .message
            .or_else(|| self.error.map(render_error))
            .unwrap_or_else(|| format!("request failed with status {status}"));

        Failure {
            kind: ErrorKind::from_status(status),
            message,
            code: exception.code,
            status: Some(status),
            timestamp: exception.timestamp,
            cause: None,
        }
    }
}

fn render_error(error: Value) -> String {
    match error {
        Value::String(message) => message,
        other => other.to_string(),
    }
}
