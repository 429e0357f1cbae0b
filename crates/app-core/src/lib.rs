//! Core application logic for SportsLinked
//!
//! This crate contains shared business logic for message requests,
//! profiles, and the content feed.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod feeds;
pub mod message_requests;
pub mod profiles;
