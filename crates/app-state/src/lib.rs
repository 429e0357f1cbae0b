//! Application state management for SportsLinked
//!
//! This crate owns the identity/session layer: who is signed in, and a
//! change channel that downstream stores subscribe to for resync.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod session;

pub use session::{Identity, IdentityWatcher, Session, SessionError, SessionManager};
