//! Shared types for the Storecheck platform
//!
//! Wire-level request/response types exchanged with the audit backend.
//! These types are shared between the client core and any tooling that
//! talks to the same API.

pub mod client;
pub mod response;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use client::{
    FeatureFlags, FeatureFlagsResponse, LoginRequest, LoginResponse, RefreshRequest,
    RefreshResponse, RegisterRequest, UserInfo,
};
pub use response::ApiResponse;
