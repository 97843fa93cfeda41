//! Authenticated access to the Reserva API.
//!
//! [`AuthenticatedApi`] sends every request through the
//! [`AuthenticatedExecutor`], so callers get token refresh and session
//! teardown without handling tokens themselves.

use std::sync::Arc;

use reserva_adapters::{AdapterError, ApiClient, HttpAuthApi, OperationResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::auth::{AuthenticatedExecutor, ExecutionError, Session, SessionStore};
use crate::config::Config;
use crate::services::RoleScopedStore;

pub struct AuthenticatedApi {
    client: ApiClient,
    executor: Arc<AuthenticatedExecutor>,
}

impl AuthenticatedApi {
    pub fn new(client: ApiClient, executor: Arc<AuthenticatedExecutor>) -> Self {
        Self { client, executor }
    }

    /// Wires the HTTP client, the token endpoints and the executor from `config`.
    pub fn from_config(
        config: &Config,
        sessions: Arc<dyn SessionStore>,
        client_scoped: Vec<Arc<dyn RoleScopedStore>>,
    ) -> Result<Self, AdapterError> {
        let client = ApiClient::new(config.api_url.clone(), config.request_timeout)?;
        let auth_api = HttpAuthApi::new(client.clone())
            .with_paths(config.refresh_path.clone(), config.logout_path.clone());

        let executor = client_scoped.into_iter().fold(
            AuthenticatedExecutor::new(sessions, Arc::new(auth_api))
                .with_refresh_policy(config.refresh_policy),
            AuthenticatedExecutor::with_client_scoped_store,
        );

        Ok(Self::new(client, Arc::new(executor)))
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn executor(&self) -> &Arc<AuthenticatedExecutor> {
        &self.executor
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> OperationResult<T> {
        let client = &self.client;
        self.executor
            .execute(|token| async move { client.get(path, Some(&token)).await })
            .await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> OperationResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let client = &self.client;
        self.executor
            .execute(|token| async move { client.post(path, Some(&token), body).await })
            .await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> OperationResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let client = &self.client;
        self.executor
            .execute(|token| async move { client.put(path, Some(&token), body).await })
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> OperationResult<T> {
        let client = &self.client;
        self.executor
            .execute(|token| async move { client.delete(path, Some(&token)).await })
            .await
    }

    /// Remote logout through the same client, then local teardown.
    pub async fn logout(&self) -> Result<Session, ExecutionError> {
        self.executor.sign_out().await
    }
}
