//! SportsLinked client core
//!
//! Umbrella crate re-exporting the workspace members: the typed backend
//! client, the identity/session layer, and the domain stores.

pub use app_core;
pub use app_state;
pub use backend_client;
