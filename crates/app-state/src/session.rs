//! Session and identity management
//!
//! `SessionManager` owns the signed-in session and publishes identity
//! changes on a watch channel. Stores take the receiver explicitly and
//! resynchronize whenever a new identity is published; the value held at
//! subscription time counts as the first notification.

use backend_client::{AuthSession, BackendClient, BackendError};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Session-related errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Backend auth call failed
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// No user is signed in
    #[error("No active session")]
    NoSession,
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// The authenticated principal all queries and mutations are scoped to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque user id assigned by the backend
    pub id: String,
}

impl Identity {
    /// Create an identity from a user id
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// A signed-in session: identity plus the tokens that back it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The authenticated identity
    pub identity: Identity,
    /// Bearer token for table requests
    pub access_token: String,
    /// Token used to obtain a fresh access token
    pub refresh_token: String,
}

/// Receiver half of the identity change channel
///
/// `None` means signed out. Clone freely; every store gets its own.
pub type IdentityWatcher = watch::Receiver<Option<Identity>>;

/// Owns the current session and the identity change channel
///
/// # Example
///
/// ```rust,no_run
/// use app_state::SessionManager;
/// use backend_client::{BackendClient, BackendClientConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = BackendClientConfig::new("https://project.supabase.co", "anon-key");
///     let mut manager = SessionManager::new(BackendClient::new(config));
///
///     let watcher = manager.watch_identity();
///     manager.sign_in("alice@example.com", "password").await?;
///     assert!(watcher.borrow().is_some());
///     Ok(())
/// }
/// ```
pub struct SessionManager {
    backend: BackendClient,
    session: Option<Session>,
    identity_tx: watch::Sender<Option<Identity>>,
}

impl SessionManager {
    /// Create a new session manager with no signed-in user
    pub fn new(backend: BackendClient) -> Self {
        let (identity_tx, _) = watch::channel(None);
        Self {
            backend,
            session: None,
            identity_tx,
        }
    }

    /// Subscribe to identity changes
    pub fn watch_identity(&self) -> IdentityWatcher {
        self.identity_tx.subscribe()
    }

    /// Sign in with email and password
    pub async fn sign_in(
        &mut self,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Identity> {
        let auth = self.backend.sign_in(email, password).await?;
        Ok(self.install(auth))
    }

    /// Create a new account and sign in as it
    pub async fn sign_up(
        &mut self,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Identity> {
        let auth = self.backend.sign_up(email, password).await?;
        Ok(self.install(auth))
    }

    /// Sign out, dropping the session and publishing a null identity
    pub fn sign_out(&mut self) {
        if self.session.take().is_some() {
            tracing::debug!("signed out");
            let _ = self.identity_tx.send(None);
        }
    }

    /// Get the current identity, if signed in
    pub fn current_identity(&self) -> Option<Identity> {
        self.session.as_ref().map(|s| s.identity.clone())
    }

    /// Get the current session, if signed in
    pub fn current_session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Get a backend client scoped to the signed-in user
    pub fn authed_client(&self) -> Result<BackendClient> {
        let session = self.session.as_ref().ok_or(SessionError::NoSession)?;
        Ok(self
            .backend
            .clone()
            .with_access_token(session.access_token.clone()))
    }

    fn install(&mut self, auth: AuthSession) -> Identity {
        let identity = Identity::new(auth.user.id);
        self.session = Some(Session {
            identity: identity.clone(),
            access_token: auth.access_token,
            refresh_token: auth.refresh_token,
        });
        tracing::debug!(user = %identity.id, "signed in");
        let _ = self.identity_tx.send(Some(identity.clone()));
        identity
    }
}
