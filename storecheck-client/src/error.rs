//! Client error types

use thiserror::Error;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed (transport-level: connect, timeout, TLS)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Authentication required (token missing, expired, or rejected)
    #[error("Authentication required")]
    Unauthorized,

    /// Credentials rejected by the server; never retried
    #[error("Credentials rejected: {0}")]
    CredentialRejected(String),

    /// Rate limited by the server; never retried
    #[error("Too many requests")]
    RateLimited,

    /// Server-side failure (5xx); retriable for login
    #[error("Server unavailable: {0}")]
    ServerUnavailable(String),

    /// Session has ended; a new login is required
    #[error("Not logged in")]
    LoggedOut,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Whether a failed login attempt may be retried with backoff.
    ///
    /// Only server-side failures and no-response conditions qualify;
    /// credential rejection and rate limiting are terminal.
    pub fn is_retriable(&self) -> bool {
        match self {
            ClientError::ServerUnavailable(_) => true,
            ClientError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Secure-storage error type
///
/// The platform vault carries no availability guarantee; every operation
/// is fallible and callers decide whether absence is normal.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Storage backend unavailable or rejected the operation
    #[error("Secure storage unavailable: {0}")]
    Unavailable(String),

    /// I/O error from a file-backed vault
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_unavailable_is_retriable() {
        assert!(ClientError::ServerUnavailable("503".into()).is_retriable());
    }

    #[test]
    fn credential_rejection_is_not_retriable() {
        assert!(!ClientError::CredentialRejected("bad password".into()).is_retriable());
        assert!(!ClientError::RateLimited.is_retriable());
        assert!(!ClientError::Unauthorized.is_retriable());
    }
}
