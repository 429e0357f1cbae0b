//! HTTP client for the SportsLinked managed backend
//!
//! This crate wraps the backend-as-a-service REST surface: table reads
//! with row filters, inserts and updates that return the affected row,
//! and the password auth endpoints. Row-level security is enforced
//! server-side; this client only attaches the caller's access token.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod error;
pub mod rest;
pub mod retry;

pub use auth::{AuthSession, AuthUser};
pub use error::BackendError;
pub use rest::{BackendClient, BackendClientConfig, SelectQuery, TableClient};
pub use retry::{network_retry, retry, RetryConfig};
