//! Password auth endpoints
//!
//! Sign-in and sign-up against the backend's auth surface. The returned
//! access token scopes subsequent table requests to the signed-in user
//! via [`BackendClient::with_access_token`].

use crate::error::BackendError;
use crate::rest::BackendClient;
use serde::{Deserialize, Serialize};

/// Credentials for password sign-in and sign-up
#[derive(Debug, Clone, Serialize)]
pub struct PasswordCredentials {
    /// Email address
    pub email: String,
    /// Password
    pub password: String,
}

/// The authenticated user, as reported by the auth endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// Opaque user id; matches `sender_id`/`receiver_id` on table rows
    pub id: String,
    /// Email address
    #[serde(default)]
    pub email: Option<String>,
}

/// A signed-in session with its tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    /// Bearer token for table requests
    pub access_token: String,
    /// Token used to obtain a fresh access token
    pub refresh_token: String,
    /// Seconds until the access token expires
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// The authenticated user
    pub user: AuthUser,
}

impl BackendClient {
    /// Sign in with email and password
    pub async fn sign_in(
        &self,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<AuthSession, BackendError> {
        let credentials = PasswordCredentials {
            email: email.into(),
            password: password.into(),
        };

        let url = self.auth_url("token");
        let req = self
            .apply_headers(self.http().post(&url))
            .query(&[("grant_type", "password")])
            .json(&credentials);

        tracing::debug!("sign_in");
        let response = req
            .send()
            .await
            .map_err(|e| BackendError::new(0, "network_error", format!("Request failed: {}", e)))?;

        self.parse_response(response).await
    }

    /// Create a new account with email and password
    ///
    /// Depending on project settings the account may require email
    /// confirmation before the returned tokens are usable.
    pub async fn sign_up(
        &self,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<AuthSession, BackendError> {
        let credentials = PasswordCredentials {
            email: email.into(),
            password: password.into(),
        };

        let url = self.auth_url("signup");
        let req = self.apply_headers(self.http().post(&url)).json(&credentials);

        tracing::debug!("sign_up");
        let response = req
            .send()
            .await
            .map_err(|e| BackendError::new(0, "network_error", format!("Request failed: {}", e)))?;

        self.parse_response(response).await
    }
}
