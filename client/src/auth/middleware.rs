//! Authenticated request execution with a single token refresh.
//!
//! [`AuthenticatedExecutor::execute`] runs an operation with the session's
//! access token. When the API rejects that token as expired (`403` with
//! sub-code 9) it refreshes once and retries once with the new token. When
//! the refresh is refused, the token pair is invalidated remotely, the
//! session is cleared and the original failure is handed back.
//!
//! At most one refresh happens per call. Errors raised along the way never
//! escape; they come back as [`ErrorKind::Unexpected`] failures.
//!
//! [`ErrorKind::Unexpected`]: reserva_adapters::ErrorKind::Unexpected

use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;

use reserva_adapters::{AuthApi, Failure, FailureClass, OperationResult};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::errors::ExecutionError;
use super::models::{Role, Session};
use super::service::SessionStore;
use crate::services::RoleScopedStore;

/// How concurrent calls that hit an expired token share refreshes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// Every call refreshes on its own; the last token written wins.
    #[default]
    Independent,
    /// Refreshes are serialized. A call that finds the session token already
    /// replaced while it waited retries with that token instead of refreshing.
    Coalesced,
}

enum Renewal {
    Refreshed(String),
    /// The refresh was refused and the session has been terminated.
    Rejected,
    /// Another call terminated the session while this one waited.
    SessionEnded,
}

pub struct AuthenticatedExecutor {
    sessions: Arc<dyn SessionStore>,
    auth_api: Arc<dyn AuthApi>,
    client_scoped: Vec<Arc<dyn RoleScopedStore>>,
    policy: RefreshPolicy,
    refresh_gate: Mutex<()>,
}

impl AuthenticatedExecutor {
    pub fn new(sessions: Arc<dyn SessionStore>, auth_api: Arc<dyn AuthApi>) -> Self {
        Self {
            sessions,
            auth_api,
            client_scoped: Vec::new(),
            policy: RefreshPolicy::default(),
            refresh_gate: Mutex::new(()),
        }
    }

    /// Registers a store to clear when a `CLIENT` session is terminated.
    pub fn with_client_scoped_store(mut self, store: Arc<dyn RoleScopedStore>) -> Self {
        self.client_scoped.push(store);
        self
    }

    pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> OperationResult<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<OperationResult<T>, E>>,
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        match self.try_execute(&operation).await {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, "authenticated call raised an error");
                OperationResult::Failure(Failure::unexpected(err))
            }
        }
    }

    async fn try_execute<T, E, F, Fut>(
        &self,
        operation: &F,
    ) -> Result<OperationResult<T>, ExecutionError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<OperationResult<T>, E>>,
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        let session = self.sessions.current().await?;
        let token = session.access_token.clone().unwrap_or_default();

        let first = invoke(operation, token).await?;
        if first.failure().map(Failure::class) != Some(FailureClass::AuthorizationExpired) {
            return Ok(first);
        }

        debug!("access token rejected as expired, refreshing");
        match self.renew(&session).await? {
            Renewal::Refreshed(token) => invoke(operation, token).await,
            Renewal::Rejected | Renewal::SessionEnded => Ok(first),
        }
    }

    async fn renew(&self, snapshot: &Session) -> Result<Renewal, ExecutionError> {
        match self.policy {
            RefreshPolicy::Independent => self.refresh_session(snapshot).await,
            RefreshPolicy::Coalesced => {
                let _gate = self.refresh_gate.lock().await;
                let latest = self.sessions.current().await?;
                if latest.access_token == snapshot.access_token {
                    return self.refresh_session(&latest).await;
                }

                debug!("session changed while waiting for refresh");
                Ok(match latest.access_token {
                    Some(token) => Renewal::Refreshed(token),
                    None => Renewal::SessionEnded,
                })
            }
        }
    }

    async fn refresh_session(&self, session: &Session) -> Result<Renewal, ExecutionError> {
        let refresh_token = session.refresh_token.as_deref().unwrap_or_default();

        let token = match self.auth_api.refresh(refresh_token).await? {
            OperationResult::Success(Some(token)) if !token.is_empty() => Some(token),
            OperationResult::Success(_) => {
                warn!("refresh returned no access token");
                None
            }
            OperationResult::Failure(failure) => {
                warn!(%failure, "refresh was refused");
                None
            }
        };

        match token {
            Some(token) => {
                self.sessions.replace_access_token(&token).await?;
                debug!("access token refreshed");
                Ok(Renewal::Refreshed(token))
            }
            None => {
                self.terminate(session).await?;
                Ok(Renewal::Rejected)
            }
        }
    }

    /// Signs the current session out: the token pair is invalidated remotely
    /// when possible and local state is torn down either way. Returns the
    /// session that was signed out.
    pub async fn sign_out(&self) -> Result<Session, ExecutionError> {
        let session = self.sessions.current().await?;
        self.terminate(&session).await?;
        Ok(session)
    }

    /// Best-effort remote logout, then local session teardown.
    async fn terminate(&self, session: &Session) -> Result<(), ExecutionError> {
        let access_token = session.access_token.as_deref().unwrap_or_default();
        let refresh_token = session.refresh_token.as_deref().unwrap_or_default();
        match self.auth_api.logout(access_token, refresh_token).await {
            Ok(OperationResult::Success(())) => {}
            Ok(OperationResult::Failure(failure)) => debug!(%failure, "remote logout refused"),
            Err(err) => debug!(error = %err, "remote logout failed"),
        }

        let prior = self.sessions.clear().await?;
        let role = prior.role().or(session.role());
        info!(?role, "session terminated");

        if role == Some(Role::Client) {
            for store in &self.client_scoped {
                debug!(store = store.name(), "clearing client state");
                store.clear().await;
            }
        }
        Ok(())
    }
}

async fn invoke<T, E, F, Fut>(
    operation: &F,
    token: String,
) -> Result<OperationResult<T>, ExecutionError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<OperationResult<T>, E>>,
    E: Into<Box<dyn StdError + Send + Sync>>,
{
    operation(token)
        .await
        .map_err(|err| ExecutionError::Operation(err.into()))
}
