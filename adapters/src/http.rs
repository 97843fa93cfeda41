//! reqwest-backed implementation of the Reserva API adapters.
//!
//! [`ApiClient`] issues requests and decodes the API envelope into an
//! [`OperationResult`]; [`HttpAuthApi`] builds the refresh and logout calls
//! on top of it.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::errors::Result;
use crate::models::{ApiEnvelope, ErrorKind, Failure, OperationResult};
use crate::AuthApi;

pub const DEFAULT_REFRESH_PATH: &str = "auth/refresh";
pub const DEFAULT_LOGOUT_PATH: &str = "auth/logout";

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(base_url, http))
    }

    pub fn with_client(base_url: impl Into<String>, http: Client) -> Self {
        Self {
            base_url: base_url.into(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&str>,
    ) -> Result<OperationResult<T>> {
        self.send::<(), T>(Method::GET, path, token, None).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<OperationResult<T>> {
        self.send(Method::POST, path, token, Some(body)).await
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<OperationResult<T>> {
        self.send(Method::PUT, path, token, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&str>,
    ) -> Result<OperationResult<T>> {
        self.send::<(), T>(Method::DELETE, path, token, None).await
    }

    pub async fn send<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&B>,
    ) -> Result<OperationResult<T>> {
        let url = self.url(path);
        debug!("{method} {url}");

        let mut request = self.http.request(method, &url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        decode_response(response).await
    }
}

async fn decode_response<T: DeserializeOwned>(response: Response) -> Result<OperationResult<T>> {
    let status = response.status();
    let body = response.text().await?;
    debug!("response {status} ({} bytes)", body.len());

    if body.trim().is_empty() {
        if status.is_success() {
            return Ok(OperationResult::Success(serde_json::from_value(Value::Null)?));
        }
        return Ok(OperationResult::Failure(status_failure(status.as_u16(), None)));
    }

    if let Ok(envelope) = serde_json::from_str::<ApiEnvelope>(&body) {
        if envelope.is_failure(status.as_u16()) {
            return Ok(OperationResult::Failure(envelope.into_failure(status.as_u16())));
        }
        let data = envelope.data.unwrap_or(Value::Null);
        return Ok(OperationResult::Success(serde_json::from_value(data)?));
    }

    if status.is_success() {
        Ok(OperationResult::Success(serde_json::from_str(&body)?))
    } else {
        Ok(OperationResult::Failure(status_failure(status.as_u16(), Some(body))))
    }
}

fn status_failure(status: u16, body: Option<String>) -> Failure {
    let message = body.unwrap_or_else(|| format!("request failed with status {status}"));
    Failure::new(ErrorKind::from_status(status), message).with_status(status)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LogoutRequest<'a> {
    access_token: &'a str,
    refresh_token: &'a str,
}

/// [`AuthApi`] over the Reserva HTTP endpoints.
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    client: ApiClient,
    refresh_path: String,
    logout_path: String,
}

impl HttpAuthApi {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            logout_path: DEFAULT_LOGOUT_PATH.to_string(),
        }
    }

    pub fn with_paths(
        mut self,
        refresh_path: impl Into<String>,
        logout_path: impl Into<String>,
    ) -> Self {
        self.refresh_path = refresh_path.into();
        self.logout_path = logout_path.into();
        self
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn refresh(&self, refresh_token: &str) -> Result<OperationResult<Option<String>>> {
        self.client
            .post(&self.refresh_path, None, &RefreshRequest { refresh_token })
            .await
    }

    async fn logout(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<OperationResult<()>> {
        let body = LogoutRequest {
            access_token,
            refresh_token,
        };
        let result: OperationResult<Value> = self
            .client
            .post(&self.logout_path, Some(access_token), &body)
            .await?;
        Ok(result.map(|_| ()))
    }
}
