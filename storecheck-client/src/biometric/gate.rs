//! Biometric credential gate
//!
//! Binds a stored login credential to successful biometric verification and
//! polices feature/enrollment preconditions. Enabling quick-unlock always
//! requires proving control of the biometric factor; it is not possible to
//! enable the vault silently.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::error::{ClientResult, VaultError};
use crate::vault::SecretVault;

use super::probe::{BiometricCapability, BiometricProbe, ChallengeError, probe_capability};

/// Vault key for the persisted "quick-unlock enabled" flag
pub const ENABLED_KEY: &str = "biometric_enabled";
/// Vault key for the stored login credential
pub const CREDENTIALS_KEY: &str = "biometric_credentials";
/// Vault key for the last successful challenge timestamp
pub const LAST_AUTH_KEY: &str = "biometric_last_auth";

// ============================================================================
// Types
// ============================================================================

/// A login credential bound to biometric verification
///
/// Created when the user opts into quick-unlock after a password login;
/// only ever replaced wholesale, never partially updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub email: String,
    pub token: String,
    #[serde(rename = "storedAt")]
    pub stored_at: DateTime<Utc>,
}

/// Remote source of the admin feature flag for biometric login
#[async_trait]
pub trait FeatureFlagSource: Send + Sync {
    async fn biometric_login_enabled(&self) -> ClientResult<bool>;
}

/// Fixed feature flag, for tests and offline operation
pub struct StaticFlags(pub bool);

#[async_trait]
impl FeatureFlagSource for StaticFlags {
    async fn biometric_login_enabled(&self) -> ClientResult<bool> {
        Ok(self.0)
    }
}

/// Why quick-unlock could not be enabled
#[derive(Debug, Error)]
pub enum EnableError {
    #[error("Biometric authentication is not available on this device")]
    HardwareUnavailable,

    #[error("No biometrics enrolled. Please set up biometrics in your device settings.")]
    NotEnrolled,

    #[error("Biometric login has been disabled by your administrator")]
    FeatureDisabled,

    #[error(transparent)]
    Challenge(#[from] ChallengeError),

    #[error("Secure storage error: {0}")]
    Storage(#[from] VaultError),
}

/// Why quick-unlock did not return a credential
#[derive(Debug, Error)]
pub enum QuickUnlockError {
    /// Quick-unlock was never enabled; no challenge is issued in this case
    #[error("Biometric login is not enabled")]
    NotEnabled,

    /// Enabled, but nothing stored; log in with a password first
    #[error("No stored credential. Please login with password first.")]
    NoCredential,

    #[error("Biometric login has been disabled by your administrator")]
    FeatureDisabled,

    #[error(transparent)]
    Challenge(#[from] ChallengeError),
}

// ============================================================================
// BiometricGate
// ============================================================================

/// Enable/disable/query logic for biometric quick-unlock
pub struct BiometricGate {
    probe: Arc<dyn BiometricProbe>,
    vault: Arc<dyn SecretVault>,
    flags: Arc<dyn FeatureFlagSource>,
    /// Session cache of the admin feature flag
    flag_cache: Mutex<Option<bool>>,
}

impl BiometricGate {
    /// Create a gate over a probe, a vault, and a feature-flag source
    pub fn new(
        probe: Arc<dyn BiometricProbe>,
        vault: Arc<dyn SecretVault>,
        flags: Arc<dyn FeatureFlagSource>,
    ) -> Self {
        Self {
            probe,
            vault,
            flags,
            flag_cache: Mutex::new(None),
        }
    }

    // ========== Capability ==========

    /// Live device capability, with the session-cached admin flag attached
    pub async fn capability(&self) -> BiometricCapability {
        let feature_enabled = self.feature_enabled().await;
        probe_capability(self.probe.as_ref(), feature_enabled).await
    }

    /// Drop the cached admin flag so the next query re-fetches it
    pub async fn invalidate_feature_cache(&self) {
        *self.flag_cache.lock().await = None;
    }

    /// The session-cached admin flag; fetch failures default to enabled
    async fn feature_enabled(&self) -> bool {
        let mut cache = self.flag_cache.lock().await;
        if let Some(cached) = *cache {
            return cached;
        }

        let enabled = match self.flags.biometric_login_enabled().await {
            Ok(enabled) => enabled,
            Err(e) => {
                tracing::debug!("Feature flag fetch failed, defaulting to enabled: {}", e);
                true
            }
        };
        *cache = Some(enabled);
        enabled
    }

    // ========== Enable / Disable ==========

    /// Whether quick-unlock is enabled; storage errors read as disabled
    pub async fn is_enabled(&self) -> bool {
        match self.vault.get(ENABLED_KEY).await {
            Ok(value) => value.as_deref() == Some("true"),
            Err(e) => {
                tracing::debug!("Could not read quick-unlock flag: {}", e);
                false
            }
        }
    }

    /// Enable quick-unlock
    ///
    /// Requires hardware, enrollment, and the admin flag; the enabled flag
    /// is persisted only after one successful challenge.
    pub async fn enable(&self) -> Result<(), EnableError> {
        if !self.feature_enabled().await {
            return Err(EnableError::FeatureDisabled);
        }

        let capability = self.capability().await;
        if !capability.hardware_present {
            return Err(EnableError::HardwareUnavailable);
        }
        if !capability.enrolled {
            return Err(EnableError::NotEnrolled);
        }

        self.verify("Verify your identity to enable biometric login")
            .await?;

        self.vault.set(ENABLED_KEY, "true").await?;
        tracing::info!("Biometric quick-unlock enabled");
        Ok(())
    }

    /// Disable quick-unlock and wipe everything it guards; idempotent
    ///
    /// The enabled flag is authoritative and must be cleared first, so a
    /// partial failure can never leave the gate effectively enabled.
    pub async fn disable(&self) -> Result<(), VaultError> {
        self.vault.delete(ENABLED_KEY).await?;

        let credential = self.vault.delete(CREDENTIALS_KEY).await;
        let stamp = self.vault.delete(LAST_AUTH_KEY).await;
        credential?;
        stamp?;

        tracing::info!("Biometric quick-unlock disabled");
        Ok(())
    }

    // ========== Credential Storage ==========

    /// Store a login credential, replacing any existing one wholesale
    pub async fn store_credential(&self, email: &str, token: &str) -> Result<(), VaultError> {
        let record = StoredCredential {
            email: email.to_string(),
            token: token.to_string(),
            stored_at: Utc::now(),
        };
        let json = serde_json::to_string(&record)?;
        self.vault.set(CREDENTIALS_KEY, &json).await
    }

    /// The stored credential, if any
    ///
    /// Absence is a normal outcome; malformed stored data also degrades to
    /// absent rather than failing the caller.
    pub async fn stored_credential(&self) -> Option<StoredCredential> {
        let raw = self.vault.get(CREDENTIALS_KEY).await.ok().flatten()?;
        match serde_json::from_str(&raw) {
            Ok(credential) => Some(credential),
            Err(e) => {
                tracing::warn!("Stored credential is malformed, treating as absent: {}", e);
                None
            }
        }
    }

    /// Remove the stored credential without touching the enabled flag
    ///
    /// Logout hook: the user stays opted in, but the old token is gone.
    pub async fn clear_stored_credential(&self) -> Result<(), VaultError> {
        self.vault.delete(CREDENTIALS_KEY).await
    }

    // ========== Challenges ==========

    /// Issue one biometric challenge; success refreshes the last-auth stamp
    pub async fn verify(&self, prompt: &str) -> Result<(), ChallengeError> {
        self.probe.challenge(prompt, "Cancel").await?;

        if let Err(e) = self.vault.set(LAST_AUTH_KEY, &Utc::now().to_rfc3339()).await {
            // Freshness fails closed, so a missing stamp only forces reauth.
            tracing::warn!("Failed to record last auth time: {}", e);
        }
        Ok(())
    }

    /// Biometric-gated retrieval of the stored credential
    ///
    /// Enablement and credential presence are checked before the costlier,
    /// user-visible challenge is triggered.
    pub async fn quick_unlock(&self) -> Result<StoredCredential, QuickUnlockError> {
        if !self.is_enabled().await {
            return Err(QuickUnlockError::NotEnabled);
        }
        if !self.feature_enabled().await {
            return Err(QuickUnlockError::FeatureDisabled);
        }
        let credential = self
            .stored_credential()
            .await
            .ok_or(QuickUnlockError::NoCredential)?;

        self.verify("Sign in with biometrics").await?;
        Ok(credential)
    }

    // ========== Freshness ==========

    /// Instant of the last successful challenge, if recorded
    pub async fn last_auth_time(&self) -> Option<DateTime<Utc>> {
        let raw = self.vault.get(LAST_AUTH_KEY).await.ok().flatten()?;
        DateTime::parse_from_rfc3339(&raw)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Whether the last successful challenge is older than `max_age`
    ///
    /// An absent stamp reads as stale, never as fresh.
    pub async fn should_require_reauth(&self, max_age: Duration) -> bool {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        match self.last_auth_time().await {
            Some(last) => Utc::now() - last > max_age,
            None => true,
        }
    }
}
