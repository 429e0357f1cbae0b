//! Error types for backend requests

use serde::{Deserialize, Serialize};

/// Error returned by the backend REST or auth surface
///
/// Covers both transport failures (status 0) and application-level
/// errors reported in the response body.
///
/// # Examples
/// ```
/// use backend_client::BackendError;
///
/// let error = BackendError::new(404, "not_found", "Row not found");
/// assert_eq!(error.status(), 404);
/// assert!(!error.is_network_error());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    /// HTTP status code (0 for transport failures)
    status: u16,
    /// Error code (e.g., "invalid_grant", "23505")
    code: String,
    /// Human-readable error message
    message: String,
}

impl BackendError {
    /// Create a new backend error
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Get the HTTP status code
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Get the error code
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Check if this is a transient network-level failure worth retrying
    pub fn is_network_error(&self) -> bool {
        matches!(self.status, 0 | 408 | 425 | 429 | 500 | 502 | 503 | 504 | 522 | 524)
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "backend error {}: {} - {}",
            self.status, self.code, self.message
        )
    }
}

impl std::error::Error for BackendError {}

/// Error body shape used by the backend's REST and auth endpoints
///
/// The two surfaces disagree on field names, so every field is optional
/// and [`ErrorBody::into_error`] picks whichever is populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// REST error code
    #[serde(default)]
    pub code: Option<String>,
    /// REST error message
    #[serde(default)]
    pub message: Option<String>,
    /// Auth error code
    #[serde(default)]
    pub error: Option<String>,
    /// Auth error description
    #[serde(default)]
    pub error_description: Option<String>,
    /// Auth error message (older endpoint versions)
    #[serde(default)]
    pub msg: Option<String>,
}

impl ErrorBody {
    /// Collapse the body into a [`BackendError`] for the given status
    pub fn into_error(self, status: u16) -> BackendError {
        let code = self
            .code
            .or(self.error)
            .unwrap_or_else(|| "unknown".to_string());
        let message = self
            .message
            .or(self.error_description)
            .or(self.msg)
            .unwrap_or_else(|| format!("HTTP {}", status));
        BackendError::new(status, code, message)
    }
}
