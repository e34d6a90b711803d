//! Storecheck Client - session & biometric credential lifecycle
//!
//! Core client-side auth plumbing for the Storecheck audit platform:
//! token holding with transparent single-flight refresh, and a biometric
//! quick-unlock vault for stored login credentials.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use storecheck_client::{
//!     BiometricGate, ClientConfig, FileVault, HttpAuthApi, MockProbe, SessionManager,
//! };
//!
//! # async fn example() -> storecheck_client::ClientResult<()> {
//! let config = ClientConfig::new("https://api.example.com");
//! let vault = Arc::new(FileVault::new("./secrets"));
//! let api = Arc::new(HttpAuthApi::new(&config));
//!
//! let session = Arc::new(SessionManager::new(api, vault.clone(), config));
//! let _user = session.login("auditor@example.com", "password").await?;
//!
//! let probe = Arc::new(MockProbe::available(vec![]));
//! let _gate = BiometricGate::new(probe, vault, session.clone());
//! # Ok(())
//! # }
//! ```

pub mod biometric;
pub mod config;
pub mod error;
pub mod http;
pub mod session;
pub mod vault;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult, VaultError};
pub use http::{AuthApi, HttpAuthApi};
pub use session::{LogoutReason, SessionManager, SessionState, TokenPair, TokenStore};
pub use vault::{FileVault, MemoryVault, SecretVault};

pub use biometric::{
    BiometricCapability, BiometricGate, BiometricKind, BiometricProbe, ChallengeError, EnableError,
    FeatureFlagSource, MockProbe, Platform, ProbeError, QuickUnlockError, StaticFlags,
    StoredCredential,
};

// Re-export shared types for convenience
pub use shared::client::{ApiResponse, FeatureFlags, LoginResponse, RefreshResponse, UserInfo};
