use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use reserva_adapters::{
    AdapterError, AuthApi, ErrorKind, Failure, OperationResult, TOKEN_EXPIRED_CODE,
};
use reserva_client::auth::{
    AuthenticatedExecutor, InMemorySessionStore, RefreshPolicy, Role, Session, SessionError,
    SessionStore,
};
use reserva_client::services::{
    branch_list, business_context, Branch, BranchList, BusinessContext, BusinessSelection,
};

#[derive(Clone, Copy)]
enum RefreshReply {
    Token(&'static str),
    Empty,
    Refused,
    Broken,
}

struct FakeAuthApi {
    reply: RefreshReply,
    refresh_calls: Mutex<Vec<String>>,
    logout_calls: Mutex<Vec<(String, String)>>,
    fail_logout: bool,
}

impl FakeAuthApi {
    fn new(reply: RefreshReply) -> Self {
        Self {
            reply,
            refresh_calls: Mutex::new(Vec::new()),
            logout_calls: Mutex::new(Vec::new()),
            fail_logout: false,
        }
    }

    fn refreshes(&self) -> Vec<String> {
        self.refresh_calls.lock().unwrap().clone()
    }

    fn logouts(&self) -> Vec<(String, String)> {
        self.logout_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthApi for FakeAuthApi {
    async fn refresh(
        &self,
        refresh_token: &str,
    ) -> reserva_adapters::Result<OperationResult<Option<String>>> {
        self.refresh_calls.lock().unwrap().push(refresh_token.to_string());
        // Suspend once so concurrent callers interleave here.
        tokio::task::yield_now().await;
        match self.reply {
            RefreshReply::Token(token) => Ok(OperationResult::Success(Some(token.to_string()))),
            RefreshReply::Empty => Ok(OperationResult::Success(None)),
            RefreshReply::Refused => Ok(OperationResult::Failure(
                Failure::new(ErrorKind::Unauthorized, "refresh token revoked").with_status(401),
            )),
            RefreshReply::Broken => Err(AdapterError::InvalidResponse(
                "connection reset".to_string(),
            )),
        }
    }

    async fn logout(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> reserva_adapters::Result<OperationResult<()>> {
        self.logout_calls
            .lock()
            .unwrap()
            .push((access_token.to_string(), refresh_token.to_string()));
        if self.fail_logout {
            return Err(AdapterError::InvalidResponse("logout unreachable".to_string()));
        }
        Ok(OperationResult::Success(()))
    }
}

fn expired() -> Failure {
    Failure::new(ErrorKind::Forbidden, "jwt expired")
        .with_status(403)
        .with_code(TOKEN_EXPIRED_CODE)
}

/// Operation that replays scripted results and records the tokens it saw.
struct Script {
    replies: Mutex<VecDeque<Result<OperationResult<String>, io::Error>>>,
    tokens: Mutex<Vec<String>>,
}

impl Script {
    fn new(replies: Vec<Result<OperationResult<String>, io::Error>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            tokens: Mutex::new(Vec::new()),
        }
    }

    async fn call(&self, token: String) -> Result<OperationResult<String>, io::Error> {
        self.tokens.lock().unwrap().push(token);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("operation called more often than scripted")
    }

    fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }
}

/// Session store that another caller empties just before this one clears it.
struct ClearedElsewhere(InMemorySessionStore);

#[async_trait]
impl SessionStore for ClearedElsewhere {
    async fn current(&self) -> Result<Session, SessionError> {
        self.0.current().await
    }

    async fn replace_access_token(&self, token: &str) -> Result<(), SessionError> {
        self.0.replace_access_token(token).await
    }

    async fn clear(&self) -> Result<Session, SessionError> {
        self.0.clear().await?;
        Ok(Session::default())
    }
}

struct Harness {
    sessions: Arc<InMemorySessionStore>,
    auth: Arc<FakeAuthApi>,
    business: Arc<BusinessContext>,
    branches: Arc<BranchList>,
    executor: AuthenticatedExecutor,
}

async fn harness(role: Role, reply: RefreshReply) -> Harness {
    harness_with(role, FakeAuthApi::new(reply), RefreshPolicy::Independent).await
}

async fn harness_with(role: Role, auth: FakeAuthApi, policy: RefreshPolicy) -> Harness {
    let sessions = Arc::new(InMemorySessionStore::new(Session::new("OLD", "REFRESH", role)));
    let auth = Arc::new(auth);

    let business = Arc::new(business_context());
    business
        .set(Some(BusinessSelection {
            business_id: "b-1".to_string(),
            name: "Barber Co".to_string(),
        }))
        .await;
    let branches = Arc::new(branch_list());
    branches
        .set(vec![Branch {
            id: "br-1".to_string(),
            name: "Centro".to_string(),
        }])
        .await;

    let executor = AuthenticatedExecutor::new(sessions.clone(), auth.clone())
        .with_client_scoped_store(business.clone())
        .with_client_scoped_store(branches.clone())
        .with_refresh_policy(policy);

    Harness {
        sessions,
        auth,
        business,
        branches,
        executor,
    }
}

#[tokio::test]
async fn success_passes_through_untouched() {
    let h = harness(Role::Client, RefreshReply::Token("NEW")).await;
    let op = Script::new(vec![Ok(OperationResult::Success("booked".to_string()))]);

    let result = h.executor.execute(|token| op.call(token)).await;

    assert_eq!(result, OperationResult::Success("booked".to_string()));
    assert_eq!(op.tokens(), vec!["OLD".to_string()]);
    assert_eq!(h.sessions.current().await.unwrap(), Session::new("OLD", "REFRESH", Role::Client));
    assert!(h.auth.refreshes().is_empty());
}

#[tokio::test]
async fn other_failures_pass_through_untouched() {
    let h = harness(Role::Client, RefreshReply::Token("NEW")).await;
    let not_found = Failure::new(ErrorKind::NotFound, "no such booking").with_status(404);
    let forbidden_other = Failure::new(ErrorKind::Forbidden, "not your branch").with_code(4);
    let op = Script::new(vec![
        Ok(OperationResult::Failure(not_found.clone())),
        Ok(OperationResult::Failure(forbidden_other.clone())),
    ]);

    assert_eq!(
        h.executor.execute(|token| op.call(token)).await,
        OperationResult::Failure(not_found)
    );
    assert_eq!(
        h.executor.execute(|token| op.call(token)).await,
        OperationResult::Failure(forbidden_other)
    );
    assert!(h.auth.refreshes().is_empty());
    assert!(h.auth.logouts().is_empty());
    assert_eq!(h.sessions.current().await.unwrap().access_token.as_deref(), Some("OLD"));
}

#[tokio::test]
async fn expired_token_is_refreshed_and_call_retried() {
    let h = harness(Role::Client, RefreshReply::Token("NEW")).await;
    let op = Script::new(vec![
        Ok(OperationResult::Failure(expired())),
        Ok(OperationResult::Success("booked".to_string())),
    ]);

    let result = h.executor.execute(|token| op.call(token)).await;

    assert_eq!(result, OperationResult::Success("booked".to_string()));
    assert_eq!(op.tokens(), vec!["OLD".to_string(), "NEW".to_string()]);
    assert_eq!(h.auth.refreshes(), vec!["REFRESH".to_string()]);
    assert_eq!(h.sessions.current().await.unwrap(), Session::new("NEW", "REFRESH", Role::Client));
    assert!(h.auth.logouts().is_empty());
}

#[tokio::test]
async fn retried_call_result_is_returned_without_second_refresh() {
    let h = harness(Role::Client, RefreshReply::Token("NEW")).await;
    let op = Script::new(vec![
        Ok(OperationResult::Failure(expired())),
        Ok(OperationResult::Failure(expired())),
    ]);

    let result = h.executor.execute(|token| op.call(token)).await;

    assert_eq!(result, OperationResult::Failure(expired()));
    assert_eq!(op.tokens().len(), 2);
    assert_eq!(h.auth.refreshes().len(), 1);
    assert_eq!(h.sessions.current().await.unwrap().access_token.as_deref(), Some("NEW"));
}

#[tokio::test]
async fn refused_refresh_logs_out_client_and_clears_client_state() {
    let h = harness(Role::Client, RefreshReply::Refused).await;
    let op = Script::new(vec![Ok(OperationResult::Failure(expired()))]);

    let result = h.executor.execute(|token| op.call(token)).await;

    assert_eq!(result, OperationResult::Failure(expired()));
    assert_eq!(op.tokens().len(), 1);
    assert_eq!(h.auth.logouts(), vec![("OLD".to_string(), "REFRESH".to_string())]);
    assert!(h.sessions.current().await.unwrap().is_empty());
    assert_eq!(h.business.get().await, None);
    assert!(h.branches.get().await.is_empty());
}

#[tokio::test]
async fn empty_refresh_payload_counts_as_refused() {
    let h = harness(Role::Client, RefreshReply::Empty).await;
    let op = Script::new(vec![Ok(OperationResult::Failure(expired()))]);

    let result = h.executor.execute(|token| op.call(token)).await;

    assert_eq!(result, OperationResult::Failure(expired()));
    assert!(h.sessions.current().await.unwrap().is_empty());
    assert_eq!(h.business.get().await, None);
}

#[tokio::test]
async fn business_logout_leaves_client_state_alone() {
    let h = harness(Role::Business, RefreshReply::Refused).await;
    let op = Script::new(vec![Ok(OperationResult::Failure(expired()))]);

    let result = h.executor.execute(|token| op.call(token)).await;

    assert_eq!(result, OperationResult::Failure(expired()));
    assert!(h.sessions.current().await.unwrap().is_empty());
    assert!(h.business.get().await.is_some());
    assert_eq!(h.branches.get().await.len(), 1);
}

#[tokio::test]
async fn failed_remote_logout_still_clears_session() {
    let mut auth = FakeAuthApi::new(RefreshReply::Refused);
    auth.fail_logout = true;
    let h = harness_with(Role::Admin, auth, RefreshPolicy::Independent).await;
    let op = Script::new(vec![Ok(OperationResult::Failure(expired()))]);

    let result = h.executor.execute(|token| op.call(token)).await;

    assert_eq!(result, OperationResult::Failure(expired()));
    assert_eq!(h.auth.logouts().len(), 1);
    assert!(h.sessions.current().await.unwrap().is_empty());
    assert!(h.business.get().await.is_some());
    assert_eq!(h.branches.get().await.len(), 1);
}

#[tokio::test]
async fn client_state_is_cleared_when_session_was_emptied_elsewhere() {
    let sessions = Arc::new(ClearedElsewhere(InMemorySessionStore::new(Session::new(
        "OLD",
        "REFRESH",
        Role::Client,
    ))));
    let auth = Arc::new(FakeAuthApi::new(RefreshReply::Refused));
    let branches = Arc::new(branch_list());
    branches
        .set(vec![Branch {
            id: "br-1".to_string(),
            name: "Centro".to_string(),
        }])
        .await;
    let executor = AuthenticatedExecutor::new(sessions.clone(), auth.clone())
        .with_client_scoped_store(branches.clone());
    let op = Script::new(vec![Ok(OperationResult::Failure(expired()))]);

    let result = executor.execute(|token| op.call(token)).await;

    assert_eq!(result, OperationResult::Failure(expired()));
    assert_eq!(auth.logouts(), vec![("OLD".to_string(), "REFRESH".to_string())]);
    assert!(sessions.current().await.unwrap().is_empty());
    assert!(branches.get().await.is_empty());
}

#[tokio::test]
async fn raised_error_becomes_unexpected_and_keeps_session() {
    let h = harness(Role::Client, RefreshReply::Token("NEW")).await;
    let op = Script::new(vec![Err(io::Error::other("socket closed"))]);

    let result = h.executor.execute(|token| op.call(token)).await;

    let failure = result.failure().unwrap();
    assert_eq!(failure.kind, ErrorKind::Unexpected);
    assert!(failure.cause.as_deref().unwrap().contains("socket closed"));
    assert_eq!(h.sessions.current().await.unwrap(), Session::new("OLD", "REFRESH", Role::Client));
    assert!(h.auth.refreshes().is_empty());
}

#[tokio::test]
async fn raised_refresh_error_becomes_unexpected() {
    let h = harness(Role::Client, RefreshReply::Broken).await;
    let op = Script::new(vec![Ok(OperationResult::Failure(expired()))]);

    let result = h.executor.execute(|token| op.call(token)).await;

    let failure = result.failure().unwrap();
    assert_eq!(failure.kind, ErrorKind::Unexpected);
    assert!(failure.cause.as_deref().unwrap().contains("connection reset"));
    assert_eq!(h.sessions.current().await.unwrap(), Session::new("OLD", "REFRESH", Role::Client));
    assert!(h.auth.logouts().is_empty());
}

#[tokio::test]
async fn repeated_successes_are_identical() {
    let h = harness(Role::Client, RefreshReply::Token("NEW")).await;
    let calls = AtomicUsize::new(0);
    let always_ok = |_token: String| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Ok::<_, io::Error>(OperationResult::Success(7u32)) }
    };

    let first = h.executor.execute(always_ok).await;
    let second = h.executor.execute(always_ok).await;

    assert_eq!(first, second);
    assert_eq!(first, OperationResult::Success(7));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.sessions.current().await.unwrap(), Session::new("OLD", "REFRESH", Role::Client));
}

#[tokio::test]
async fn missing_session_sends_empty_token() {
    let sessions = Arc::new(InMemorySessionStore::default());
    let auth = Arc::new(FakeAuthApi::new(RefreshReply::Token("NEW")));
    let executor = AuthenticatedExecutor::new(sessions, auth);
    let op = Script::new(vec![Ok(OperationResult::Success("ok".to_string()))]);

    executor.execute(|token| op.call(token)).await;

    assert_eq!(op.tokens(), vec![String::new()]);
}

/// Operation that rejects `OLD` as expired and accepts any other token.
async fn token_sensitive(token: String) -> Result<OperationResult<String>, io::Error> {
    if token == "OLD" {
        Ok(OperationResult::Failure(expired()))
    } else {
        Ok(OperationResult::Success(format!("served with {token}")))
    }
}

#[tokio::test]
async fn concurrent_calls_refresh_independently_by_default() {
    let h = harness(Role::Client, RefreshReply::Token("NEW")).await;

    let (a, b) = tokio::join!(
        h.executor.execute(token_sensitive),
        h.executor.execute(token_sensitive)
    );

    assert_eq!(a, OperationResult::Success("served with NEW".to_string()));
    assert_eq!(b, OperationResult::Success("served with NEW".to_string()));
    assert_eq!(h.auth.refreshes().len(), 2);
}

#[tokio::test]
async fn coalesced_policy_shares_one_refresh() {
    let h = harness_with(
        Role::Client,
        FakeAuthApi::new(RefreshReply::Token("NEW")),
        RefreshPolicy::Coalesced,
    )
    .await;

    let (a, b) = tokio::join!(
        h.executor.execute(token_sensitive),
        h.executor.execute(token_sensitive)
    );

    assert_eq!(a, OperationResult::Success("served with NEW".to_string()));
    assert_eq!(b, OperationResult::Success("served with NEW".to_string()));
    assert_eq!(h.auth.refreshes().len(), 1);
}

#[tokio::test]
async fn coalesced_waiter_returns_original_failure_after_logout() {
    let h = harness_with(
        Role::Client,
        FakeAuthApi::new(RefreshReply::Refused),
        RefreshPolicy::Coalesced,
    )
    .await;

    let (a, b) = tokio::join!(
        h.executor.execute(token_sensitive),
        h.executor.execute(token_sensitive)
    );

    assert_eq!(a, OperationResult::Failure(expired()));
    assert_eq!(b, OperationResult::Failure(expired()));
    assert_eq!(h.auth.refreshes().len(), 1);
    assert_eq!(h.auth.logouts().len(), 1);
    assert!(h.sessions.current().await.unwrap().is_empty());
    assert_eq!(h.business.get().await, None);
    assert!(h.branches.get().await.is_empty());
}
