//! Token store - single source of truth for the current token pair
//!
//! Memory-first with a durable mirror in the secret vault. The mirror only
//! needs to survive the current run; availability is preferred over
//! durability, so a failed mirror write never rolls back memory.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::vault::SecretVault;

/// Vault key for the access token mirror
pub const ACCESS_TOKEN_KEY: &str = "auth_token";
/// Vault key for the refresh token mirror
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// The current access/refresh token pair
///
/// An absent pair means the session is logged out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Holder of the current token pair
///
/// The in-memory slot is the only mutable shared resource of the session
/// core; all mutation goes through [`set`](TokenStore::set) and
/// [`clear`](TokenStore::clear), which are atomic with respect to reads.
pub struct TokenStore {
    slot: RwLock<Option<TokenPair>>,
    vault: Arc<dyn SecretVault>,
}

impl TokenStore {
    /// Create a store mirrored into the given vault
    pub fn new(vault: Arc<dyn SecretVault>) -> Self {
        Self {
            slot: RwLock::new(None),
            vault,
        }
    }

    /// Current access token, if any
    ///
    /// Memory first; on a miss the durable mirror is read once and adopted.
    /// Never fails: an unavailable vault reads as absent.
    pub async fn access_token(&self) -> Option<String> {
        if let Some(pair) = self.slot.read().await.as_ref() {
            return Some(pair.access_token.clone());
        }
        self.adopt_from_mirror().await.map(|p| p.access_token)
    }

    /// Current refresh token, if any
    pub async fn refresh_token(&self) -> Option<String> {
        if let Some(pair) = self.slot.read().await.as_ref() {
            return pair.refresh_token.clone();
        }
        self.adopt_from_mirror().await.and_then(|p| p.refresh_token)
    }

    /// Replace the token pair
    ///
    /// `refresh_token: None` keeps the previously known refresh token.
    /// Memory is updated first so concurrent reads see the new value
    /// deterministically; the mirror write failure is logged and ignored.
    pub async fn set(&self, access_token: String, refresh_token: Option<String>) {
        let refresh = {
            let mut slot = self.slot.write().await;
            let refresh = match refresh_token {
                Some(rt) => Some(rt),
                None => slot.as_ref().and_then(|p| p.refresh_token.clone()),
            };
            *slot = Some(TokenPair {
                access_token: access_token.clone(),
                refresh_token: refresh.clone(),
            });
            refresh
        };

        if let Err(e) = self.vault.set(ACCESS_TOKEN_KEY, &access_token).await {
            tracing::warn!("Failed to mirror access token: {}", e);
        }
        if let Some(rt) = refresh {
            if let Err(e) = self.vault.set(REFRESH_TOKEN_KEY, &rt).await {
                tracing::warn!("Failed to mirror refresh token: {}", e);
            }
        }
    }

    /// Wipe memory and mirror; idempotent
    pub async fn clear(&self) {
        *self.slot.write().await = None;

        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(e) = self.vault.delete(key).await {
                tracing::warn!("Failed to clear token mirror {}: {}", key, e);
            }
        }
    }

    /// Read the mirror once and adopt it into the empty memory slot
    async fn adopt_from_mirror(&self) -> Option<TokenPair> {
        let access = self.vault.get(ACCESS_TOKEN_KEY).await.ok().flatten()?;
        let refresh = self.vault.get(REFRESH_TOKEN_KEY).await.ok().flatten();

        let mut slot = self.slot.write().await;
        match slot.as_ref() {
            // A concurrent set() won while we were reading the mirror.
            Some(current) => Some(current.clone()),
            None => {
                let pair = TokenPair {
                    access_token: access,
                    refresh_token: refresh,
                };
                *slot = Some(pair.clone());
                Some(pair)
            }
        }
    }
}
