//! Client facade
//!
//! - **CableClient**: wires channel state, replication and readiness over a
//!   [`CableStore`](crate::core_store::CableStore)
//! - **Events**: typed store event handlers
//! - **User**: roster entries with display names and roles

pub mod client;
pub mod events;
pub mod user;

pub use client::{CableClient, ClientEvent};
pub use events::{mentions, moderation_notice};
pub use user::{User, CABAL_CONTEXT};
