//! HTTP client for the remote authentication API

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use shared::client::{
    ApiResponse, FeatureFlags, FeatureFlagsResponse, LoginRequest, LoginResponse, RefreshRequest,
    RefreshResponse, RegisterRequest, UserInfo,
};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

// ============================================================================
// AuthApi Trait
// ============================================================================

/// Remote authentication API
///
/// Tokens are passed per call; no implementation retains one.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Login with email and password
    async fn login(&self, email: &str, password: &str) -> ClientResult<LoginResponse>;

    /// Register a new account
    async fn register(&self, email: &str, password: &str, name: &str)
    -> ClientResult<LoginResponse>;

    /// Mint a new access token from a refresh token
    async fn refresh(&self, refresh_token: &str) -> ClientResult<RefreshResponse>;

    /// Get current user information
    async fn me(&self, access_token: &str) -> ClientResult<UserInfo>;

    /// Fetch admin-controlled feature flags
    async fn feature_flags(&self, access_token: &str) -> ClientResult<FeatureFlags>;
}

// ============================================================================
// HttpAuthApi - network implementation
// ============================================================================

/// HTTP implementation of [`AuthApi`] for the audit backend
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    client: Client,
    base_url: String,
}

impl HttpAuthApi {
    /// Create a new API client from configuration
    pub fn new(config: &ClientConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Make a GET request with a bearer token
    async fn get<T: DeserializeOwned>(&self, path: &str, token: Option<&str>) -> ClientResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.get(&url);

        if let Some(token) = token {
            request = request.header(reqwest::header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await?;
        Self::handle_response(response).await
    }

    /// Make a POST request with JSON body
    async fn post<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.post(&url).json(body).send().await?;
        Self::handle_response(response).await
    }

    /// Handle the HTTP response
    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return match status {
                StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
                StatusCode::TOO_MANY_REQUESTS => Err(ClientError::RateLimited),
                s if s.is_server_error() => Err(ClientError::ServerUnavailable(text)),
                _ => Err(ClientError::CredentialRejected(text)),
            };
        }

        response.json().await.map_err(Into::into)
    }

    fn unwrap_data<T>(resp: ApiResponse<T>, what: &str) -> ClientResult<T> {
        resp.data
            .ok_or_else(|| ClientError::InvalidResponse(format!("Missing {what}")))
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, email: &str, password: &str) -> ClientResult<LoginResponse> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };

        let resp: ApiResponse<LoginResponse> =
            match self.post("/api/auth/login", &request).await {
                // A 401 on the login endpoint means the credentials were
                // rejected, not that a token expired.
                Err(ClientError::Unauthorized) => {
                    return Err(ClientError::CredentialRejected(
                        "Invalid email or password".to_string(),
                    ));
                }
                other => other?,
            };

        Self::unwrap_data(resp, "login data")
    }

    async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> ClientResult<LoginResponse> {
        let request = RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            name: name.to_string(),
        };

        let resp: ApiResponse<LoginResponse> = self.post("/api/auth/register", &request).await?;
        Self::unwrap_data(resp, "registration data")
    }

    async fn refresh(&self, refresh_token: &str) -> ClientResult<RefreshResponse> {
        let request = RefreshRequest {
            refresh_token: refresh_token.to_string(),
        };

        let resp: ApiResponse<RefreshResponse> = self.post("/api/auth/refresh", &request).await?;
        Self::unwrap_data(resp, "refresh data")
    }

    async fn me(&self, access_token: &str) -> ClientResult<UserInfo> {
        let resp: ApiResponse<UserInfo> = self.get("/api/auth/me", Some(access_token)).await?;
        Self::unwrap_data(resp, "user data")
    }

    async fn feature_flags(&self, access_token: &str) -> ClientResult<FeatureFlags> {
        let resp: ApiResponse<FeatureFlagsResponse> = self
            .get("/api/settings/features/all", Some(access_token))
            .await?;
        Ok(Self::unwrap_data(resp, "feature flags")?.features)
    }
}
