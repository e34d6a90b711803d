//! Session lifecycle: token holding and single-flight refresh

pub mod manager;
pub mod token;

pub use manager::{LogoutReason, SessionManager, SessionState};
pub use token::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, TokenPair, TokenStore};
