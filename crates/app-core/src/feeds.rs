//! Content feed
//!
//! Read path for the home feed, backed by the `posts` table. Pagination
//! is keyset-based on `created_at`: each page's cursor is the timestamp
//! of its oldest post.

use backend_client::{BackendClient, BackendError, SelectQuery, TableClient};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during feed operations
#[derive(Debug, Error)]
pub enum FeedError {
    /// Backend call failed
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Post body failed validation
    #[error("Invalid post: {0}")]
    InvalidPost(String),
}

/// Result type for feed operations
pub type Result<T> = std::result::Result<T, FeedError>;

/// Maximum post length in characters
pub const MAX_POST_LENGTH: usize = 2_000;

/// A post in the content feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedPost {
    /// Row id, assigned by the backend
    pub id: String,
    /// Author's user id
    pub author_id: String,
    /// Post text
    pub text: String,
    /// Attached media URL, if any
    #[serde(default)]
    pub media_url: Option<String>,
    /// When the post was created
    pub created_at: DateTime<Utc>,
}

/// Column values for a new post
#[derive(Debug, Clone, Serialize)]
pub struct NewFeedPost {
    /// Author's user id
    pub author_id: String,
    /// Post text
    pub text: String,
    /// Attached media URL, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
}

/// One page of the feed, newest first
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPage {
    /// Posts in this page
    pub posts: Vec<FeedPost>,
    /// Cursor for the next page; `None` when the feed is exhausted
    pub cursor: Option<DateTime<Utc>>,
}

impl FeedPage {
    /// Build a page from fetched posts
    ///
    /// A short page (fewer posts than requested) has no next cursor.
    pub fn from_posts(posts: Vec<FeedPost>, requested: u32) -> Self {
        let cursor = if posts.len() as u32 >= requested {
            posts.last().map(|p| p.created_at)
        } else {
            None
        };
        Self { posts, cursor }
    }
}

/// Service for reading and writing the content feed
pub struct FeedService {
    table: TableClient,
}

impl FeedService {
    /// Default page size for [`fetch_page`](Self::fetch_page)
    pub const DEFAULT_PAGE_SIZE: u32 = 25;

    /// Create a feed service from a backend client
    pub fn new(client: BackendClient) -> Self {
        Self {
            table: client.table("posts"),
        }
    }

    /// Fetch one page of the feed, newest first
    ///
    /// Pass the previous page's cursor to continue; `None` starts from
    /// the top.
    pub async fn fetch_page(
        &self,
        limit: u32,
        cursor: Option<DateTime<Utc>>,
    ) -> Result<FeedPage> {
        let mut query = SelectQuery::new().order("created_at.desc").limit(limit);
        if let Some(cursor) = cursor {
            query = query.lt(
                "created_at",
                cursor.to_rfc3339_opts(SecondsFormat::Micros, true),
            );
        }

        let posts: Vec<FeedPost> = self.table.select(query).await?;
        tracing::debug!(count = posts.len(), "feed page fetched");
        Ok(FeedPage::from_posts(posts, limit))
    }

    /// Create a new post and return it
    pub async fn create_post(
        &self,
        author_id: impl Into<String>,
        text: impl Into<String>,
        media_url: Option<String>,
    ) -> Result<FeedPost> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(FeedError::InvalidPost("post text is empty".to_string()));
        }
        if text.chars().count() > MAX_POST_LENGTH {
            return Err(FeedError::InvalidPost(format!(
                "post text exceeds {} characters",
                MAX_POST_LENGTH
            )));
        }

        let row = NewFeedPost {
            author_id: author_id.into(),
            text,
            media_url,
        };
        Ok(self.table.insert(&row).await?)
    }
}
