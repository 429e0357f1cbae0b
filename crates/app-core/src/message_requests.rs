//! Message request workflow
//!
//! A message request is a directed proposal from one user to another to
//! open a messaging channel, with lifecycle pending -> accepted/rejected.
//! [`MessageRequestStore`] owns the signed-in user's two pending lists
//! (incoming and outgoing), keeps them synchronized with the backend's
//! `message_requests` table, and patches them locally after each
//! successful mutation instead of refetching.

use async_trait::async_trait;
use backend_client::{BackendClient, BackendError, SelectQuery, TableClient};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use app_state::{Identity, IdentityWatcher};

/// Errors that can occur during message request operations
#[derive(Debug, Error)]
pub enum RequestError {
    /// Backend call failed
    #[error("Backend error: {0}")]
    Api(#[from] BackendError),

    /// No user is signed in
    #[error("No authenticated identity")]
    NoIdentity,
}

/// Result type for message request operations
pub type Result<T> = std::result::Result<T, RequestError>;

/// Status of a message request
///
/// Transitions are monotonic: a request starts `Pending` and moves to
/// `Accepted` or `Rejected` exactly once. The backend enforces this; the
/// client never writes `Pending` after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRequestStatus {
    /// Awaiting a response from the receiver
    Pending,
    /// Receiver accepted the request
    Accepted,
    /// Receiver rejected the request
    Rejected,
}

impl Default for MessageRequestStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl MessageRequestStatus {
    /// Wire name of the status, as stored in the `status` column
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

/// A directed connection request between two users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRequest {
    /// Row id, assigned by the backend on creation
    pub id: String,
    /// User who sent the request; immutable after creation
    pub sender_id: String,
    /// User the request is addressed to; immutable after creation
    pub receiver_id: String,
    /// Current status
    #[serde(default)]
    pub status: MessageRequestStatus,
    /// When the row was created
    pub created_at: DateTime<Utc>,
    /// Last status transition time
    pub updated_at: DateTime<Utc>,
}

impl MessageRequest {
    /// Check if the request is still pending
    pub fn is_pending(&self) -> bool {
        self.status == MessageRequestStatus::Pending
    }
}

/// Column values for a new message request row
///
/// The backend fills in `id` and the timestamps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMessageRequest {
    /// User sending the request
    pub sender_id: String,
    /// User the request is addressed to
    pub receiver_id: String,
    /// Always `Pending` on creation
    pub status: MessageRequestStatus,
}

/// Remote interface for the `message_requests` table
///
/// The store depends on this seam rather than the HTTP client directly,
/// so tests can drive it with a mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRequestApi: Send + Sync {
    /// Pending requests addressed to the given user
    async fn list_pending_for_receiver(&self, receiver_id: &str) -> Result<Vec<MessageRequest>>;

    /// Pending requests sent by the given user
    async fn list_pending_from_sender(&self, sender_id: &str) -> Result<Vec<MessageRequest>>;

    /// Insert a new request and return the created row
    async fn create(&self, row: NewMessageRequest) -> Result<MessageRequest>;

    /// Set the status of an existing request and return the updated row
    async fn set_status(
        &self,
        id: &str,
        status: MessageRequestStatus,
    ) -> Result<MessageRequest>;
}

/// [`MessageRequestApi`] backed by the backend's `message_requests` table
pub struct MessageRequestTable {
    table: TableClient,
}

impl MessageRequestTable {
    /// Create a table-backed API from an authenticated client
    pub fn new(client: BackendClient) -> Self {
        Self {
            table: client.table("message_requests"),
        }
    }
}

#[async_trait]
impl MessageRequestApi for MessageRequestTable {
    async fn list_pending_for_receiver(&self, receiver_id: &str) -> Result<Vec<MessageRequest>> {
        let query = SelectQuery::new()
            .eq("receiver_id", receiver_id)
            .eq("status", MessageRequestStatus::Pending.as_str());
        Ok(self.table.select(query).await?)
    }

    async fn list_pending_from_sender(&self, sender_id: &str) -> Result<Vec<MessageRequest>> {
        let query = SelectQuery::new()
            .eq("sender_id", sender_id)
            .eq("status", MessageRequestStatus::Pending.as_str());
        Ok(self.table.select(query).await?)
    }

    async fn create(&self, row: NewMessageRequest) -> Result<MessageRequest> {
        Ok(self.table.insert(&row).await?)
    }

    async fn set_status(
        &self,
        id: &str,
        status: MessageRequestStatus,
    ) -> Result<MessageRequest> {
        #[derive(Serialize)]
        struct StatusPatch {
            status: MessageRequestStatus,
        }

        Ok(self.table.update_by_id(id, &StatusPatch { status }).await?)
    }
}

/// Store state behind the lock
#[derive(Debug, Default)]
struct StoreState {
    pending: Vec<MessageRequest>,
    sent: Vec<MessageRequest>,
    loading: bool,
    error: Option<String>,
    /// Bumped on every sync start; a fetch that finishes under a stale
    /// generation discards its results instead of clobbering newer state.
    generation: u64,
}

/// Owns the signed-in user's pending and sent request lists
///
/// The store is created with an explicit API handle and identity watcher
/// (no ambient context). [`spawn_sync_task`](Self::spawn_sync_task)
/// resynchronizes on every identity change, treating the value held at
/// subscription time as the first notification. A null identity performs
/// no fetch and leaves the lists as they are.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use app_core::message_requests::{MessageRequestStore, MessageRequestTable};
/// use backend_client::{BackendClient, BackendClientConfig};
/// use tokio::sync::watch;
///
/// #[tokio::main]
/// async fn main() {
///     let config = BackendClientConfig::new("https://project.supabase.co", "anon-key");
///     let api = Arc::new(MessageRequestTable::new(BackendClient::new(config)));
///     let (_identity_tx, identity_rx) = watch::channel(None);
///
///     let store = MessageRequestStore::new(api, identity_rx);
///     let _task = store.spawn_sync_task();
/// }
/// ```
#[derive(Clone)]
pub struct MessageRequestStore {
    api: Arc<dyn MessageRequestApi>,
    identity: IdentityWatcher,
    state: Arc<RwLock<StoreState>>,
}

impl MessageRequestStore {
    /// Create a new store
    ///
    /// `loading` starts `true` and stays `true` until the first sync
    /// completes or fails.
    pub fn new(api: Arc<dyn MessageRequestApi>, identity: IdentityWatcher) -> Self {
        Self {
            api,
            identity,
            state: Arc::new(RwLock::new(StoreState {
                loading: true,
                ..Default::default()
            })),
        }
    }

    /// Snapshot of pending requests addressed to the current user
    pub async fn pending_requests(&self) -> Vec<MessageRequest> {
        self.state.read().await.pending.clone()
    }

    /// Snapshot of pending requests sent by the current user
    pub async fn sent_requests(&self) -> Vec<MessageRequest> {
        self.state.read().await.sent.clone()
    }

    /// Whether a sync is in flight (or none has run yet)
    pub async fn loading(&self) -> bool {
        self.state.read().await.loading
    }

    /// Message of the most recent failure, if any
    pub async fn error(&self) -> Option<String> {
        self.state.read().await.error.clone()
    }

    fn current_identity(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    /// Fetch both lists from the backend and replace local state
    ///
    /// The two filtered reads run concurrently and are applied
    /// atomically: on any failure neither list changes and `error` holds
    /// the first failure's message. `loading` is released on every exit
    /// path. Failures are not propagated; they are only visible through
    /// [`error`](Self::error).
    pub async fn fetch_all(&self) {
        let Some(me) = self.current_identity() else {
            return;
        };

        let generation = {
            let mut state = self.state.write().await;
            state.loading = true;
            state.generation += 1;
            state.generation
        };

        let (incoming, outgoing) = tokio::join!(
            self.api.list_pending_for_receiver(&me.id),
            self.api.list_pending_from_sender(&me.id),
        );

        let mut state = self.state.write().await;
        if state.generation != generation {
            // A newer sync owns the lists (and the loading flag) now.
            return;
        }
        state.loading = false;

        match (incoming, outgoing) {
            (Ok(pending), Ok(sent)) => {
                tracing::debug!(
                    user = %me.id,
                    pending = pending.len(),
                    sent = sent.len(),
                    "message requests synced"
                );
                state.pending = pending;
                state.sent = sent;
                state.error = None;
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(user = %me.id, error = %e, "message request sync failed");
                state.error = Some(e.to_string());
            }
        }
    }

    /// Re-fetch both lists; identical to [`fetch_all`](Self::fetch_all)
    pub async fn refresh(&self) {
        self.fetch_all().await;
    }

    /// Send a message request to another user
    ///
    /// Inserts a pending row and, on success, appends the created row to
    /// the sent list (prior order preserved). There is no client-side
    /// dedup or self-send check; the backend may reject either. On
    /// failure the error is both recorded and returned.
    pub async fn send(&self, receiver_id: impl Into<String>) -> Result<MessageRequest> {
        let me = self.current_identity().ok_or(RequestError::NoIdentity)?;
        let row = NewMessageRequest {
            sender_id: me.id,
            receiver_id: receiver_id.into(),
            status: MessageRequestStatus::Pending,
        };

        match self.api.create(row).await {
            Ok(created) => {
                let mut state = self.state.write().await;
                state.sent.push(created.clone());
                Ok(created)
            }
            Err(e) => {
                tracing::warn!(error = %e, "send message request failed");
                self.state.write().await.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Accept or reject a pending request
    ///
    /// On success the request leaves the pending list regardless of the
    /// decision; resolved requests are not tracked locally. An id absent
    /// from the list is a local no-op, though the remote update still
    /// runs and its result is returned. On failure the pending list is
    /// untouched (retry stays possible) and the error is both recorded
    /// and returned.
    pub async fn respond(&self, request_id: &str, accept: bool) -> Result<MessageRequest> {
        let status = if accept {
            MessageRequestStatus::Accepted
        } else {
            MessageRequestStatus::Rejected
        };

        match self.api.set_status(request_id, status).await {
            Ok(updated) => {
                let mut state = self.state.write().await;
                state.pending.retain(|r| r.id != request_id);
                Ok(updated)
            }
            Err(e) => {
                tracing::warn!(request_id, error = %e, "respond to message request failed");
                self.state.write().await.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Spawn the background task that syncs on identity changes
    ///
    /// The identity held when the task starts counts as the first
    /// notification. The task ends when the identity provider is
    /// dropped; in-flight fetches that outlive their identity are
    /// discarded by the generation guard.
    pub fn spawn_sync_task(&self) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        let mut identity = self.identity.clone();

        tokio::spawn(async move {
            loop {
                if identity.borrow_and_update().is_some() {
                    store.fetch_all().await;
                }
                if identity.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::watch;

    fn request(id: &str, sender: &str, receiver: &str) -> MessageRequest {
        MessageRequest {
            id: id.to_string(),
            sender_id: sender.to_string(),
            receiver_id: receiver.to_string(),
            status: MessageRequestStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn identity_channel(
        id: Option<&str>,
    ) -> (watch::Sender<Option<Identity>>, IdentityWatcher) {
        watch::channel(id.map(Identity::new))
    }

    fn store_with(
        api: MockMessageRequestApi,
        identity: IdentityWatcher,
    ) -> MessageRequestStore {
        MessageRequestStore::new(Arc::new(api), identity)
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(
            serde_json::to_string(&MessageRequestStatus::Pending).unwrap(),
            r#""pending""#
        );
        let status: MessageRequestStatus = serde_json::from_str(r#""rejected""#).unwrap();
        assert_eq!(status, MessageRequestStatus::Rejected);
        assert_eq!(MessageRequestStatus::Accepted.as_str(), "accepted");
    }

    #[tokio::test]
    async fn test_initial_state() {
        let (_tx, rx) = identity_channel(Some("u1"));
        let store = store_with(MockMessageRequestApi::new(), rx);

        assert!(store.loading().await);
        assert!(store.pending_requests().await.is_empty());
        assert!(store.sent_requests().await.is_empty());
        assert!(store.error().await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_partitions_lists() {
        // One incoming pending request, nothing sent.
        let mut api = MockMessageRequestApi::new();
        api.expect_list_pending_for_receiver()
            .withf(|receiver| receiver == "u1")
            .returning(|_| Ok(vec![request("r1", "u2", "u1")]));
        api.expect_list_pending_from_sender()
            .withf(|sender| sender == "u1")
            .returning(|_| Ok(vec![]));

        let (_tx, rx) = identity_channel(Some("u1"));
        let store = store_with(api, rx);
        store.fetch_all().await;

        let pending = store.pending_requests().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "r1");
        assert_eq!(pending[0].receiver_id, "u1");
        assert!(pending[0].is_pending());
        assert!(store.sent_requests().await.is_empty());
        assert!(!store.loading().await);
        assert!(store.error().await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_without_identity_is_noop() {
        // No expectations: any API call would panic the mock.
        let (_tx, rx) = identity_channel(None);
        let store = store_with(MockMessageRequestApi::new(), rx);

        store.fetch_all().await;

        // Untouched, including the initial loading flag.
        assert!(store.loading().await);
        assert!(store.pending_requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_previous_lists() {
        let mut api = MockMessageRequestApi::new();
        api.expect_list_pending_for_receiver()
            .times(1)
            .returning(|_| Ok(vec![request("r1", "u2", "u1")]));
        api.expect_list_pending_from_sender()
            .times(1)
            .returning(|_| Ok(vec![request("r9", "u1", "u5")]));
        // Second sync: one read fails, the other still succeeds.
        api.expect_list_pending_for_receiver()
            .returning(|_| Ok(vec![]));
        api.expect_list_pending_from_sender()
            .returning(|_| Err(BackendError::new(503, "service_unavailable", "down").into()));

        let (_tx, rx) = identity_channel(Some("u1"));
        let store = store_with(api, rx);

        store.fetch_all().await;
        assert_eq!(store.pending_requests().await.len(), 1);
        assert_eq!(store.sent_requests().await.len(), 1);

        store.refresh().await;

        // Atomic application: neither list changed, error is visible,
        // loading was released.
        assert_eq!(store.pending_requests().await.len(), 1);
        assert_eq!(store.sent_requests().await.len(), 1);
        assert!(!store.loading().await);
        let error = store.error().await.unwrap();
        assert!(error.contains("503"));
    }

    #[tokio::test]
    async fn test_loading_released_on_failure() {
        let mut api = MockMessageRequestApi::new();
        api.expect_list_pending_for_receiver()
            .returning(|_| Err(BackendError::new(0, "network_error", "refused").into()));
        api.expect_list_pending_from_sender().returning(|_| Ok(vec![]));

        let (_tx, rx) = identity_channel(Some("u1"));
        let store = store_with(api, rx);
        store.fetch_all().await;

        assert!(!store.loading().await);
        assert!(store.error().await.is_some());
    }

    #[tokio::test]
    async fn test_send_appends_to_sent() {
        let mut api = MockMessageRequestApi::new();
        api.expect_create()
            .withf(|row| {
                row.sender_id == "u1"
                    && row.receiver_id == "u3"
                    && row.status == MessageRequestStatus::Pending
            })
            .returning(|row| {
                let mut created = request("r2", &row.sender_id, &row.receiver_id);
                created.status = row.status;
                Ok(created)
            });

        let (_tx, rx) = identity_channel(Some("u1"));
        let store = store_with(api, rx);

        let created = store.send("u3").await.unwrap();
        assert_eq!(created.id, "r2");

        let sent = store.sent_requests().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].sender_id, "u1");
        assert_eq!(sent[0].receiver_id, "u3");
        assert!(sent[0].is_pending());
    }

    #[tokio::test]
    async fn test_send_preserves_order() {
        let mut api = MockMessageRequestApi::new();
        api.expect_create()
            .returning(|row| Ok(request("r-new", &row.sender_id, &row.receiver_id)));

        let (_tx, rx) = identity_channel(Some("u1"));
        let store = store_with(api, rx);
        {
            let mut state = store.state.write().await;
            state.sent.push(request("r-old", "u1", "u2"));
        }

        store.send("u3").await.unwrap();

        let sent = store.sent_requests().await;
        assert_eq!(sent[0].id, "r-old");
        assert_eq!(sent[1].id, "r-new");
    }

    #[tokio::test]
    async fn test_send_without_identity() {
        let (_tx, rx) = identity_channel(None);
        let store = store_with(MockMessageRequestApi::new(), rx);

        let error = store.send("u3").await.unwrap_err();
        assert!(matches!(error, RequestError::NoIdentity));
    }

    #[tokio::test]
    async fn test_send_failure_sets_error_and_propagates() {
        let mut api = MockMessageRequestApi::new();
        api.expect_create()
            .returning(|_| Err(BackendError::new(409, "23505", "duplicate key").into()));

        let (_tx, rx) = identity_channel(Some("u1"));
        let store = store_with(api, rx);

        let result = store.send("u3").await;
        assert!(result.is_err());
        assert!(store.sent_requests().await.is_empty());
        assert!(store.error().await.unwrap().contains("duplicate key"));
    }

    #[tokio::test]
    async fn test_respond_accept_removes_from_pending() {
        let mut api = MockMessageRequestApi::new();
        api.expect_set_status()
            .withf(|id, status| id == "r1" && *status == MessageRequestStatus::Accepted)
            .returning(|id, status| {
                let mut updated = request(id, "u2", "u1");
                updated.status = status;
                Ok(updated)
            });

        let (_tx, rx) = identity_channel(Some("u1"));
        let store = store_with(api, rx);
        {
            let mut state = store.state.write().await;
            state.pending.push(request("r1", "u2", "u1"));
        }

        let updated = store.respond("r1", true).await.unwrap();
        assert_eq!(updated.status, MessageRequestStatus::Accepted);
        assert!(store.pending_requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_respond_reject_also_removes() {
        // Removal does not depend on the decision.
        let mut api = MockMessageRequestApi::new();
        api.expect_set_status()
            .withf(|id, status| id == "r1" && *status == MessageRequestStatus::Rejected)
            .returning(|id, status| {
                let mut updated = request(id, "u2", "u1");
                updated.status = status;
                Ok(updated)
            });

        let (_tx, rx) = identity_channel(Some("u1"));
        let store = store_with(api, rx);
        {
            let mut state = store.state.write().await;
            state.pending.push(request("r1", "u2", "u1"));
        }

        store.respond("r1", false).await.unwrap();
        assert!(store.pending_requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_respond_absent_id_is_local_noop() {
        // The remote update still runs and its result is returned.
        let mut api = MockMessageRequestApi::new();
        api.expect_set_status().returning(|id, status| {
            let mut updated = request(id, "u2", "u9");
            updated.status = status;
            Ok(updated)
        });

        let (_tx, rx) = identity_channel(Some("u1"));
        let store = store_with(api, rx);
        {
            let mut state = store.state.write().await;
            state.pending.push(request("r1", "u2", "u1"));
        }

        let updated = store.respond("r-unknown", true).await.unwrap();
        assert_eq!(updated.id, "r-unknown");

        let pending = store.pending_requests().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "r1");
    }

    #[tokio::test]
    async fn test_respond_failure_keeps_pending() {
        let mut api = MockMessageRequestApi::new();
        api.expect_set_status()
            .returning(|_, _| Err(BackendError::new(0, "network_error", "refused").into()));

        let (_tx, rx) = identity_channel(Some("u1"));
        let store = store_with(api, rx);
        {
            let mut state = store.state.write().await;
            state.pending.push(request("r1", "u2", "u1"));
        }

        let result = store.respond("r1", false).await;
        assert!(result.is_err());

        let pending = store.pending_requests().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "r1");
        assert!(store.error().await.unwrap().contains("refused"));
    }

    #[tokio::test]
    async fn test_sync_task_fetches_on_login() {
        let mut api = MockMessageRequestApi::new();
        api.expect_list_pending_for_receiver()
            .withf(|receiver| receiver == "u1")
            .returning(|_| Ok(vec![request("r1", "u2", "u1")]));
        api.expect_list_pending_from_sender()
            .withf(|sender| sender == "u1")
            .returning(|_| Ok(vec![]));

        let (tx, rx) = identity_channel(None);
        let store = store_with(api, rx);
        let task = store.spawn_sync_task();

        // Signed out: nothing happens.
        tokio::task::yield_now().await;
        assert!(store.pending_requests().await.is_empty());

        tx.send(Some(Identity::new("u1"))).unwrap();

        let mut synced = false;
        for _ in 0..100 {
            if !store.pending_requests().await.is_empty() {
                synced = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(synced, "sync task never fetched after login");
        assert!(!store.loading().await);

        // Dropping the provider ends the task.
        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("sync task did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_sync_task_initial_identity_counts() {
        let mut api = MockMessageRequestApi::new();
        api.expect_list_pending_for_receiver()
            .returning(|_| Ok(vec![request("r1", "u2", "u1")]));
        api.expect_list_pending_from_sender().returning(|_| Ok(vec![]));

        // Identity already present before the task starts.
        let (tx, rx) = identity_channel(Some("u1"));
        let store = store_with(api, rx);
        let task = store.spawn_sync_task();

        let mut synced = false;
        for _ in 0..100 {
            if !store.pending_requests().await.is_empty() {
                synced = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(synced, "initial identity was not treated as a notification");

        drop(tx);
        let _ = tokio::time::timeout(Duration::from_secs(1), task).await;
    }
}
