//! Profile management
//!
//! Athlete, scout, and team profiles stored in the backend's `profiles`
//! table. Discovery search fetches a page and filters client-side; the
//! backend has no text-search endpoint exposed to this client.

use backend_client::{BackendClient, BackendError, SelectQuery, TableClient};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during profile operations
#[derive(Debug, Error)]
pub enum ProfileError {
    /// Backend call failed
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// No profile row for the given user
    #[error("Profile not found: {0}")]
    NotFound(String),
}

/// Result type for profile operations
pub type Result<T> = std::result::Result<T, ProfileError>;

/// What kind of account a profile represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    /// An individual athlete
    Athlete,
    /// A scout or recruiter
    Scout,
    /// A club or team account
    Team,
}

/// A user's public profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// User id; matches the auth user id
    pub id: String,
    /// Display name shown across the app
    pub display_name: String,
    /// Account kind
    pub kind: ProfileKind,
    /// Primary sport, e.g. "football"
    #[serde(default)]
    pub sport: Option<String>,
    /// Free-form bio
    #[serde(default)]
    pub bio: Option<String>,
    /// Avatar image URL
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// When the profile was created
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Case-insensitive match against display name, sport, or bio
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.display_name.to_lowercase().contains(&query)
            || self
                .sport
                .as_ref()
                .map(|s| s.to_lowercase().contains(&query))
                .unwrap_or(false)
            || self
                .bio
                .as_ref()
                .map(|b| b.to_lowercase().contains(&query))
                .unwrap_or(false)
    }
}

/// Editable profile fields
///
/// `None` fields are omitted from the patch and left unchanged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfilePatch {
    /// New display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// New primary sport
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sport: Option<String>,
    /// New bio
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// New avatar URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Filter profiles by an optional kind and an optional search query
pub fn filter_profiles(
    profiles: Vec<Profile>,
    kind: Option<ProfileKind>,
    query: Option<&str>,
) -> Vec<Profile> {
    profiles
        .into_iter()
        .filter(|p| kind.map(|k| p.kind == k).unwrap_or(true))
        .filter(|p| query.map(|q| p.matches(q)).unwrap_or(true))
        .collect()
}

/// Service for reading and updating profiles
pub struct ProfileService {
    table: TableClient,
}

impl ProfileService {
    /// Create a profile service from a backend client
    pub fn new(client: BackendClient) -> Self {
        Self {
            table: client.table("profiles"),
        }
    }

    /// Fetch a profile by user id
    pub async fn get(&self, user_id: &str) -> Result<Profile> {
        let rows: Vec<Profile> = self
            .table
            .select(SelectQuery::new().eq("id", user_id))
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ProfileError::NotFound(user_id.to_string()))
    }

    /// Fetch a discovery page and filter it client-side
    pub async fn search(
        &self,
        kind: Option<ProfileKind>,
        query: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Profile>> {
        let mut select = SelectQuery::new().order("created_at.desc").limit(limit);
        if let Some(kind) = kind {
            let kind_value = match kind {
                ProfileKind::Athlete => "athlete",
                ProfileKind::Scout => "scout",
                ProfileKind::Team => "team",
            };
            select = select.eq("kind", kind_value);
        }

        let rows: Vec<Profile> = self.table.select(select).await?;
        // Kind is already narrowed server-side; only the text query is local.
        Ok(filter_profiles(rows, None, query))
    }

    /// Update the signed-in user's own profile
    ///
    /// Row-level policies reject writes to other users' rows.
    pub async fn update_own(&self, user_id: &str, patch: &ProfilePatch) -> Result<Profile> {
        Ok(self.table.update_by_id(user_id, patch).await?)
    }
}
