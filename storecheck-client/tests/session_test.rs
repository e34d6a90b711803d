// storecheck-client/tests/session_test.rs
// Session lifecycle: login retry, single-flight refresh, logout semantics

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use shared::client::{FeatureFlags, LoginResponse, RefreshResponse, UserInfo};
use storecheck_client::{
    AuthApi, ClientConfig, ClientError, ClientResult, LogoutReason, MemoryVault, SecretVault,
    SessionManager, SessionState, VaultError,
};

// ============================================================================
// Test doubles
// ============================================================================

fn test_user() -> UserInfo {
    UserInfo {
        id: "u-1".to_string(),
        email: "auditor@example.com".to_string(),
        name: "Auditor".to_string(),
        role: "auditor".to_string(),
    }
}

fn test_config() -> ClientConfig {
    ClientConfig::new("http://test").with_login_retry(3, Duration::from_millis(10))
}

struct MockAuthApi {
    login_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    login_outcomes: Mutex<VecDeque<ClientResult<LoginResponse>>>,
    refresh_outcomes: Mutex<VecDeque<ClientResult<RefreshResponse>>>,
    refresh_delay: Duration,
}

impl MockAuthApi {
    fn new() -> Self {
        Self {
            login_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            login_outcomes: Mutex::new(VecDeque::new()),
            refresh_outcomes: Mutex::new(VecDeque::new()),
            refresh_delay: Duration::ZERO,
        }
    }

    fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    fn push_login(&self, outcome: ClientResult<LoginResponse>) {
        self.login_outcomes.lock().unwrap().push_back(outcome);
    }

    fn push_refresh(&self, outcome: ClientResult<RefreshResponse>) {
        self.refresh_outcomes.lock().unwrap().push_back(outcome);
    }

    fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthApi for MockAuthApi {
    async fn login(&self, _email: &str, _password: &str) -> ClientResult<LoginResponse> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        let queued = self.login_outcomes.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| {
            Ok(LoginResponse {
                token: "token-1".to_string(),
                refresh_token: Some("refresh-1".to_string()),
                user: test_user(),
            })
        })
    }

    async fn register(
        &self,
        _email: &str,
        _password: &str,
        _name: &str,
    ) -> ClientResult<LoginResponse> {
        Ok(LoginResponse {
            token: "token-1".to_string(),
            refresh_token: Some("refresh-1".to_string()),
            user: test_user(),
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> ClientResult<RefreshResponse> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.refresh_delay).await;
        let queued = self.refresh_outcomes.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| {
            Ok(RefreshResponse {
                token: "token-2".to_string(),
                refresh_token: None,
            })
        })
    }

    async fn me(&self, _access_token: &str) -> ClientResult<UserInfo> {
        Ok(test_user())
    }

    async fn feature_flags(&self, _access_token: &str) -> ClientResult<FeatureFlags> {
        Ok(FeatureFlags::default())
    }
}

/// Vault whose every operation fails, for availability-over-durability tests
struct UnavailableVault;

#[async_trait]
impl SecretVault for UnavailableVault {
    async fn get(&self, _key: &str) -> Result<Option<String>, VaultError> {
        Err(VaultError::Unavailable("keystore locked".into()))
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<(), VaultError> {
        Err(VaultError::Unavailable("keystore locked".into()))
    }

    async fn delete(&self, _key: &str) -> Result<(), VaultError> {
        Err(VaultError::Unavailable("keystore locked".into()))
    }
}

fn new_session(api: Arc<MockAuthApi>) -> Arc<SessionManager> {
    Arc::new(SessionManager::new(
        api,
        Arc::new(MemoryVault::new()),
        test_config(),
    ))
}

// ============================================================================
// Single-flight refresh
// ============================================================================

#[tokio::test]
async fn concurrent_unauthorized_calls_share_one_refresh() {
    let api = Arc::new(MockAuthApi::new().with_refresh_delay(Duration::from_millis(50)));
    let session = new_session(api.clone());
    session.login("auditor@example.com", "pw").await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let session = session.clone();
        handles.push(tokio::spawn(async move {
            session
                .execute(|token| async move {
                    // The old token is rejected; only the refreshed one works.
                    match token.as_deref() {
                        Some("token-2") => Ok("ok"),
                        _ => Err(ClientError::Unauthorized),
                    }
                })
                .await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "ok");
    }

    assert_eq!(api.refresh_calls(), 1);
    assert_eq!(session.access_token().await.as_deref(), Some("token-2"));
    assert_eq!(session.state().await, SessionState::Active);
}

#[tokio::test]
async fn failed_refresh_logs_out_exactly_once() {
    let api = Arc::new(MockAuthApi::new().with_refresh_delay(Duration::from_millis(50)));
    api.push_refresh(Err(ClientError::CredentialRejected(
        "refresh token expired".into(),
    )));

    let session = new_session(api.clone());
    session.login("auditor@example.com", "pw").await.unwrap();
    let mut logout_rx = session.subscribe_logout();

    let mut handles = Vec::new();
    for _ in 0..5 {
        let session = session.clone();
        handles.push(tokio::spawn(async move {
            session
                .execute(|_token| async move { Err::<(), _>(ClientError::Unauthorized) })
                .await
        }));
    }

    for handle in handles {
        assert!(matches!(
            handle.await.unwrap(),
            Err(ClientError::Unauthorized)
        ));
    }

    assert_eq!(api.refresh_calls(), 1);
    assert_eq!(session.state().await, SessionState::LoggedOut);
    assert!(session.access_token().await.is_none());

    // Exactly one logout event, no matter how many callers triggered it.
    assert_eq!(logout_rx.recv().await.unwrap(), LogoutReason::SessionExpired);
    assert!(logout_rx.try_recv().is_err());
}

#[tokio::test]
async fn unauthorized_call_is_retried_exactly_once() {
    let api = Arc::new(MockAuthApi::new());
    let session = new_session(api.clone());
    session.login("auditor@example.com", "pw").await.unwrap();

    let op_calls = Arc::new(AtomicUsize::new(0));
    let counted = op_calls.clone();
    let result: ClientResult<()> = session
        .execute(move |_token| {
            let counted = counted.clone();
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Err(ClientError::Unauthorized)
            }
        })
        .await;

    // Refresh succeeded, the retry still failed: surfaced unchanged, no loop.
    assert!(matches!(result, Err(ClientError::Unauthorized)));
    assert_eq!(op_calls.load(Ordering::SeqCst), 2);
    assert_eq!(api.refresh_calls(), 1);
}

#[tokio::test]
async fn non_auth_errors_do_not_trigger_refresh() {
    let api = Arc::new(MockAuthApi::new());
    let session = new_session(api.clone());
    session.login("auditor@example.com", "pw").await.unwrap();

    let result: ClientResult<()> = session
        .execute(|_token| async move { Err(ClientError::ServerUnavailable("503".into())) })
        .await;

    assert!(matches!(result, Err(ClientError::ServerUnavailable(_))));
    assert_eq!(api.refresh_calls(), 0);
}

// ============================================================================
// Login retry policy
// ============================================================================

#[tokio::test]
async fn login_retries_server_failures_with_backoff() {
    let api = Arc::new(MockAuthApi::new());
    api.push_login(Err(ClientError::ServerUnavailable("502".into())));
    api.push_login(Err(ClientError::ServerUnavailable("503".into())));

    let session = new_session(api.clone());
    let user = session.login("auditor@example.com", "pw").await.unwrap();

    assert_eq!(user.email, "auditor@example.com");
    assert_eq!(api.login_calls(), 3);
    assert_eq!(session.access_token().await.as_deref(), Some("token-1"));
}

#[tokio::test]
async fn login_never_retries_credential_rejection() {
    let api = Arc::new(MockAuthApi::new());
    api.push_login(Err(ClientError::CredentialRejected("bad password".into())));

    let session = new_session(api.clone());
    let result = session.login("auditor@example.com", "wrong").await;

    assert!(matches!(result, Err(ClientError::CredentialRejected(_))));
    assert_eq!(api.login_calls(), 1);
}

#[tokio::test]
async fn login_never_retries_rate_limiting() {
    let api = Arc::new(MockAuthApi::new());
    api.push_login(Err(ClientError::RateLimited));

    let session = new_session(api.clone());
    let result = session.login("auditor@example.com", "pw").await;

    assert!(matches!(result, Err(ClientError::RateLimited)));
    assert_eq!(api.login_calls(), 1);
}

#[tokio::test]
async fn login_gives_up_after_max_attempts() {
    let api = Arc::new(MockAuthApi::new());
    for _ in 0..3 {
        api.push_login(Err(ClientError::ServerUnavailable("503".into())));
    }

    let session = new_session(api.clone());
    let result = session.login("auditor@example.com", "pw").await;

    assert!(matches!(result, Err(ClientError::ServerUnavailable(_))));
    assert_eq!(api.login_calls(), 3);
}

// ============================================================================
// Token mirror
// ============================================================================

#[tokio::test]
async fn tokens_are_adopted_from_the_mirror() {
    let api = Arc::new(MockAuthApi::new());
    let vault = MemoryVault::new();

    let session = Arc::new(SessionManager::new(
        api.clone(),
        Arc::new(vault.clone()),
        test_config(),
    ));
    session.login("auditor@example.com", "pw").await.unwrap();
    drop(session);

    // A fresh manager over the same vault picks the pair back up.
    let session = Arc::new(SessionManager::new(api, Arc::new(vault), test_config()));
    assert_eq!(session.access_token().await.as_deref(), Some("token-1"));
}

#[tokio::test]
async fn unavailable_mirror_does_not_fail_login() {
    let api = Arc::new(MockAuthApi::new());
    let session = Arc::new(SessionManager::new(
        api,
        Arc::new(UnavailableVault),
        test_config(),
    ));

    session.login("auditor@example.com", "pw").await.unwrap();
    // Memory still holds the pair even though every mirror write failed.
    assert_eq!(session.access_token().await.as_deref(), Some("token-1"));
}

#[tokio::test]
async fn logout_clears_tokens_and_notifies() {
    let api = Arc::new(MockAuthApi::new());
    let session = new_session(api);
    session.login("auditor@example.com", "pw").await.unwrap();
    let mut logout_rx = session.subscribe_logout();

    session.logout().await;
    session.logout().await;

    assert!(session.access_token().await.is_none());
    assert_eq!(session.state().await, SessionState::LoggedOut);
    assert_eq!(logout_rx.recv().await.unwrap(), LogoutReason::UserRequested);
    assert!(logout_rx.try_recv().is_err());
}
