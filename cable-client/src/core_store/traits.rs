//! Storage/Network Collaborator Trait
//!
//! Defines everything this crate needs from the post store and the replication
//! network. Implementations own persistence, signatures and transports.

use super::errors::StoreResult;
use super::events::{RoleMap, StoreEvent};
use crate::core_post::{Post, PostHash, PublicKey, ReverseLinks, Timestamp};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Profile information the store keeps for a user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfo {
    pub name: String,
    pub accept_role: bool,
}

/// Post store and replication network, as seen by the client
///
/// Request methods are fire-and-forget: the store replicates in the background
/// and reports results through [`CableStore::subscribe`]. Duplicate in-flight
/// requests must be tolerated by the implementation.
#[async_trait]
pub trait CableStore: Send + Sync {
    /// Public key of the local identity
    fn local_key(&self) -> PublicKey;

    /// Subscribe to the in-order event stream
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;

    /// Posts in `channel` with `since <= timestamp` (and `timestamp <= until`
    /// unless `until` is zero), at most `limit`. Deleted posts come back as `None`.
    async fn fetch_range(
        &self,
        channel: &str,
        since: Timestamp,
        until: Timestamp,
        limit: usize,
    ) -> StoreResult<Vec<Option<Post>>>;

    /// For each hash, the hashes of posts that link to it
    async fn reverse_links(&self, hashes: &[PostHash]) -> StoreResult<ReverseLinks>;

    /// Ask peers for posts in a time window; `until` zero keeps the request live
    async fn request_posts(
        &self,
        channel: &str,
        since: Timestamp,
        until: Timestamp,
        ttl: u8,
        limit: usize,
    ) -> StoreResult<()>;

    /// Ask peers for channel membership and topic
    async fn request_state(&self, channel: &str, ttl: u8, hops: u32) -> StoreResult<()>;

    /// Ask peers for moderation state covering `channels`
    async fn request_moderation(
        &self,
        ttl: u8,
        channels: &[String],
        hops: u32,
        since: Timestamp,
    ) -> StoreResult<()>;

    /// Ask peers for the list of channels
    async fn request_channels(&self, ttl: u8, offset: usize, limit: usize) -> StoreResult<()>;

    async fn joined_channels(&self) -> StoreResult<Vec<String>>;

    async fn known_channels(&self) -> StoreResult<Vec<String>>;

    async fn users_in_channel(&self, channel: &str) -> StoreResult<HashMap<PublicKey, UserInfo>>;

    async fn topic(&self, channel: &str) -> StoreResult<String>;

    /// Role assignments for every known user
    async fn all_roles(&self) -> StoreResult<RoleMap> {
        Ok(RoleMap::new())
    }

    /// Publish post/join for the local user
    async fn publish_join(&self, channel: &str) -> StoreResult<()>;

    /// Publish post/leave for the local user
    async fn publish_leave(&self, channel: &str) -> StoreResult<()>;

    /// Publish post/text
    async fn post_text(&self, channel: &str, text: &str) -> StoreResult<PostHash>;

    /// Publish post/topic
    async fn set_topic(&self, channel: &str, topic: &str) -> StoreResult<()>;

    /// Publish post/info with a new display name
    async fn set_name(&self, name: &str) -> StoreResult<()>;
}

/// Type alias for a shared store handle
pub type SharedStore = Arc<dyn CableStore>;
