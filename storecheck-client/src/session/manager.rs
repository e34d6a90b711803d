//! Session manager - login, logout, and transparent token refresh
//!
//! Wraps every outbound authenticated call so that token expiry is
//! invisible to callers, while guaranteeing at most one refresh network
//! call is in flight per process.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock, broadcast, watch};

use shared::client::{FeatureFlags, LoginResponse, UserInfo};

use crate::biometric::FeatureFlagSource;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::http::AuthApi;
use crate::session::token::TokenStore;
use crate::vault::SecretVault;

// ============================================================================
// Session State
// ============================================================================

/// Logical session state
///
/// `LoggedOut` is terminal until a new login produces a fresh token pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Refreshing,
    LoggedOut,
}

/// Why the session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    /// The user asked to log out
    UserRequested,
    /// A token refresh failed irrecoverably
    SessionExpired,
}

/// Resolved outcome of a refresh attempt: the new access token, or `None`
/// when the refresh failed and the session ended.
type RefreshOutcome = Option<String>;

enum RefreshRole {
    Leader(watch::Sender<Option<RefreshOutcome>>),
    Follower(watch::Receiver<Option<RefreshOutcome>>),
}

// ============================================================================
// SessionManager
// ============================================================================

/// Session lifecycle coordinator
///
/// Owns the [`TokenStore`] and intercepts authentication-rejected responses:
/// concurrent callers converge on a single refresh call, then each original
/// call is retried exactly once with the new token.
pub struct SessionManager {
    api: Arc<dyn AuthApi>,
    tokens: TokenStore,
    config: ClientConfig,
    state: RwLock<SessionState>,
    refresh_slot: Mutex<Option<watch::Receiver<Option<RefreshOutcome>>>>,
    logout_tx: broadcast::Sender<LogoutReason>,
}

impl SessionManager {
    /// Create a session manager over an API handle and a secret vault
    pub fn new(api: Arc<dyn AuthApi>, vault: Arc<dyn SecretVault>, config: ClientConfig) -> Self {
        let (logout_tx, _) = broadcast::channel(16);
        Self {
            api,
            tokens: TokenStore::new(vault),
            config,
            state: RwLock::new(SessionState::Active),
            refresh_slot: Mutex::new(None),
            logout_tx,
        }
    }

    /// Current access token, if any
    pub async fn access_token(&self) -> Option<String> {
        self.tokens.access_token().await
    }

    /// The underlying token store
    pub fn token_store(&self) -> &TokenStore {
        &self.tokens
    }

    /// Current session state
    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Subscribe to logout events
    ///
    /// Each Active -> LoggedOut transition is broadcast exactly once, no
    /// matter how many concurrent callers triggered it.
    pub fn subscribe_logout(&self) -> broadcast::Receiver<LogoutReason> {
        self.logout_tx.subscribe()
    }

    // ========== Login / Logout ==========

    /// Login with email and password
    ///
    /// Retriable failures (5xx, no response) are retried with exponential
    /// backoff up to the configured attempt limit; credential rejection is
    /// surfaced immediately.
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<UserInfo> {
        let mut attempt = 0u32;
        let resp = loop {
            attempt += 1;
            match self.api.login(email, password).await {
                Ok(resp) => break resp,
                Err(e) if e.is_retriable() && attempt < self.config.login_max_attempts => {
                    let delay = self.config.login_backoff * 2u32.pow(attempt - 1);
                    tracing::debug!(attempt, "Login failed ({}), retrying in {:?}", e, delay);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        };

        self.adopt_login(resp).await
    }

    /// Register a new account; a successful registration opens a session
    pub async fn register(&self, email: &str, password: &str, name: &str) -> ClientResult<UserInfo> {
        let resp = self.api.register(email, password, name).await?;
        self.adopt_login(resp).await
    }

    /// Log out and clear the token pair; idempotent
    pub async fn logout(&self) {
        self.end_session(LogoutReason::UserRequested).await;
    }

    async fn adopt_login(&self, resp: LoginResponse) -> ClientResult<UserInfo> {
        self.tokens.set(resp.token, resp.refresh_token).await;
        *self.state.write().await = SessionState::Active;
        Ok(resp.user)
    }

    /// Transition to LoggedOut, clearing tokens and notifying observers once
    async fn end_session(&self, reason: LogoutReason) {
        let already_out = {
            let mut state = self.state.write().await;
            let already_out = *state == SessionState::LoggedOut;
            *state = SessionState::LoggedOut;
            already_out
        };

        self.tokens.clear().await;

        if !already_out {
            tracing::info!("Session ended: {:?}", reason);
            let _ = self.logout_tx.send(reason);
        }
    }

    // ========== Authenticated Call Wrapper ==========

    /// Run an authenticated operation with transparent refresh
    ///
    /// The operation receives the current access token. If it fails with
    /// [`ClientError::Unauthorized`], a single-flight refresh is performed
    /// and the operation is retried exactly once with the new token; any
    /// other failure, or a failed refresh, is surfaced unchanged.
    ///
    /// Login and refresh themselves must not go through this wrapper.
    pub async fn execute<T, F, Fut>(&self, op: F) -> ClientResult<T>
    where
        F: Fn(Option<String>) -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        let token = self.tokens.access_token().await;
        match op(token).await {
            Err(ClientError::Unauthorized) => match self.refresh_once().await {
                Some(new_token) => op(Some(new_token)).await,
                None => Err(ClientError::Unauthorized),
            },
            other => other,
        }
    }

    /// Fetch the current user through the authenticated wrapper
    pub async fn me(&self) -> ClientResult<UserInfo> {
        self.execute(|token| {
            let api = self.api.clone();
            async move {
                let token = token.ok_or(ClientError::Unauthorized)?;
                api.me(&token).await
            }
        })
        .await
    }

    /// Fetch the admin feature flags through the authenticated wrapper
    pub async fn feature_flags(&self) -> ClientResult<FeatureFlags> {
        self.execute(|token| {
            let api = self.api.clone();
            async move {
                let token = token.ok_or(ClientError::Unauthorized)?;
                api.feature_flags(&token).await
            }
        })
        .await
    }

    // ========== Single-Flight Refresh ==========

    /// Join the in-flight refresh, or become its leader
    ///
    /// For N concurrent callers observing a 401, exactly one network refresh
    /// happens and all N observe its outcome.
    async fn refresh_once(&self) -> RefreshOutcome {
        let role = {
            let mut slot = self.refresh_slot.lock().await;
            match slot.as_ref() {
                Some(rx) => RefreshRole::Follower(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    *slot = Some(rx);
                    RefreshRole::Leader(tx)
                }
            }
        };

        match role {
            RefreshRole::Leader(tx) => {
                *self.state.write().await = SessionState::Refreshing;
                let outcome = self.perform_refresh().await;
                let _ = tx.send(Some(outcome.clone()));
                *self.refresh_slot.lock().await = None;
                outcome
            }
            RefreshRole::Follower(mut rx) => match rx.wait_for(|v| v.is_some()).await {
                Ok(resolved) => resolved.clone().flatten(),
                // Leader dropped without resolving; treat as failed refresh.
                Err(_) => None,
            },
        }
    }

    /// Perform the actual refresh network call
    ///
    /// Never retried: any failure here is fatal to the session.
    async fn perform_refresh(&self) -> RefreshOutcome {
        let Some(refresh_token) = self.tokens.refresh_token().await else {
            tracing::debug!("No refresh token available, ending session");
            self.end_session(LogoutReason::SessionExpired).await;
            return None;
        };

        match self.api.refresh(&refresh_token).await {
            Ok(resp) => {
                self.tokens.set(resp.token.clone(), resp.refresh_token).await;
                *self.state.write().await = SessionState::Active;
                tracing::debug!("Access token refreshed");
                Some(resp.token)
            }
            Err(e) => {
                tracing::warn!("Token refresh failed, ending session: {}", e);
                self.end_session(LogoutReason::SessionExpired).await;
                None
            }
        }
    }
}

#[async_trait]
impl FeatureFlagSource for SessionManager {
    async fn biometric_login_enabled(&self) -> ClientResult<bool> {
        Ok(self.feature_flags().await?.feature_biometric_auth)
    }
}
