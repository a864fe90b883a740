//! Client-side reconciliation layer for a cable chat log.
//!
//! Turns a partially replicated, causally linked set of posts into a stable,
//! paginated timeline per channel, and decides what to request from peers and
//! when. Storage, identity and transports live behind [`core_store::CableStore`].

pub mod config;
pub mod core_channel;
pub mod core_client;
pub mod core_post;
pub mod core_replication;
pub mod core_store;
pub mod logging;
pub mod metrics;
pub mod readiness;
pub mod shutdown;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use core_client::{CableClient, ClientEvent};
pub use logging::{init_logging, LogLevel};
