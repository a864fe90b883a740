//! In-memory CableStore for testing
//!
//! Holds posts, channel lists, users and topics in memory, records every
//! replication request and publish call, and lets tests inject events and
//! failures.

use super::fixtures::{test_key, PostBuilder};
use crate::core_post::{Post, PostHash, PublicKey, ReverseLinks, Timestamp};
use crate::core_store::{CableStore, RoleMap, StoreError, StoreEvent, StoreResult, UserInfo};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// A replication request as issued by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedRequest {
    Posts {
        channel: String,
        since: Timestamp,
        until: Timestamp,
        ttl: u8,
        limit: usize,
    },
    State {
        channel: String,
        ttl: u8,
        hops: u32,
    },
    Moderation {
        ttl: u8,
        channels: Vec<String>,
        hops: u32,
        since: Timestamp,
    },
    Channels {
        ttl: u8,
        offset: usize,
        limit: usize,
    },
}

/// A post the client asked the store to publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Published {
    Join(String),
    Leave(String),
    Text { channel: String, text: String },
    Topic { channel: String, topic: String },
    Name(String),
}

#[derive(Default)]
struct MockState {
    posts: Vec<Post>,
    deleted: HashSet<PostHash>,
    joined: Vec<String>,
    known: Vec<String>,
    users: HashMap<String, HashMap<PublicKey, UserInfo>>,
    topics: HashMap<String, String>,
    roles: RoleMap,
    requests: Vec<RecordedRequest>,
    published: Vec<Published>,
    fail_fetch: bool,
    fail_reverse_links: bool,
    fail_joined_channels: bool,
    fail_known_channels: bool,
    fail_post_requests: bool,
}

/// Mock store for testing without a real database or network
pub struct MockStore {
    key: PublicKey,
    state: Arc<Mutex<MockState>>,
    events: broadcast::Sender<StoreEvent>,
}

impl MockStore {
    /// Create an empty store whose local identity is `test_key(1)`
    pub fn new() -> Self {
        Self::with_key(test_key(1))
    }

    pub fn with_key(key: PublicKey) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            key,
            state: Arc::new(Mutex::new(MockState::default())),
            events,
        }
    }

    pub fn add_post(&self, post: Post) {
        let mut state = self.state.lock().unwrap();
        if !state.known.contains(&post.channel) {
            state.known.push(post.channel.clone());
        }
        state.posts.push(post);
    }

    pub fn add_posts(&self, posts: impl IntoIterator<Item = Post>) {
        for post in posts {
            self.add_post(post);
        }
    }

    /// Mark a stored post deleted; `fetch_range` returns `None` in its place
    pub fn delete_post(&self, hash: PostHash) {
        self.state.lock().unwrap().deleted.insert(hash);
    }

    pub fn set_joined(&self, channels: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state.joined = channels.iter().map(|c| c.to_string()).collect();
        for channel in channels {
            if !state.known.iter().any(|k| k == channel) {
                state.known.push(channel.to_string());
            }
        }
    }

    pub fn set_known(&self, channels: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state.known = channels.iter().map(|c| c.to_string()).collect();
    }

    pub fn add_user(&self, channel: &str, key: PublicKey, name: &str) {
        self.state
            .lock()
            .unwrap()
            .users
            .entry(channel.to_string())
            .or_default()
            .insert(key, UserInfo { name: name.to_string(), accept_role: false });
    }

    pub fn set_topic_text(&self, channel: &str, topic: &str) {
        self.state.lock().unwrap().topics.insert(channel.to_string(), topic.to_string());
    }

    pub fn set_roles(&self, roles: RoleMap) {
        self.state.lock().unwrap().roles = roles;
    }

    pub fn fail_fetch(&self, fail: bool) {
        self.state.lock().unwrap().fail_fetch = fail;
    }

    pub fn fail_reverse_links(&self, fail: bool) {
        self.state.lock().unwrap().fail_reverse_links = fail;
    }

    /// Make `joined_channels` and `known_channels` fail
    pub fn fail_channel_lists(&self, fail: bool) {
        self.fail_joined_channels(fail);
        self.fail_known_channels(fail);
    }

    pub fn fail_joined_channels(&self, fail: bool) {
        self.state.lock().unwrap().fail_joined_channels = fail;
    }

    pub fn fail_known_channels(&self, fail: bool) {
        self.state.lock().unwrap().fail_known_channels = fail;
    }

    /// Make `request_posts` fail. Failed requests are still recorded.
    pub fn fail_post_requests(&self, fail: bool) {
        self.state.lock().unwrap().fail_post_requests = fail;
    }

    /// Requests recorded so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Post requests for `channel`
    pub fn post_requests(&self, channel: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| matches!(r, RecordedRequest::Posts { channel: c, .. } if c == channel))
            .collect()
    }

    pub fn clear_requests(&self) {
        self.state.lock().unwrap().requests.clear();
    }

    pub fn published(&self) -> Vec<Published> {
        self.state.lock().unwrap().published.clone()
    }

    /// Deliver an event to every subscriber
    pub fn emit(&self, event: StoreEvent) {
        let _ = self.events.send(event);
    }

    fn record(&self, request: RecordedRequest) {
        self.state.lock().unwrap().requests.push(request);
    }

    fn publish(&self, published: Published) {
        self.state.lock().unwrap().published.push(published);
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CableStore for MockStore {
    fn local_key(&self) -> PublicKey {
        self.key
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    async fn fetch_range(
        &self,
        channel: &str,
        since: Timestamp,
        until: Timestamp,
        limit: usize,
    ) -> StoreResult<Vec<Option<Post>>> {
        let state = self.state.lock().unwrap();
        if state.fail_fetch {
            return Err(StoreError::Unavailable("fetch disabled".to_string()));
        }

        let mut matching: Vec<&Post> = state
            .posts
            .iter()
            .filter(|p| p.channel == channel)
            .filter(|p| p.timestamp >= since && (until.0 == 0 || p.timestamp <= until))
            .collect();
        matching.sort_by_key(|p| p.timestamp);

        // Most recent `limit` posts
        if limit > 0 && matching.len() > limit {
            matching.drain(..matching.len() - limit);
        }

        Ok(matching
            .into_iter()
            .map(|p| (!state.deleted.contains(&p.post_hash)).then(|| p.clone()))
            .collect())
    }

    async fn reverse_links(&self, hashes: &[PostHash]) -> StoreResult<ReverseLinks> {
        let state = self.state.lock().unwrap();
        if state.fail_reverse_links {
            return Err(StoreError::Internal("reverse index unavailable".to_string()));
        }

        let mut index = ReverseLinks::new();
        for hash in hashes {
            let children: Vec<PostHash> = state
                .posts
                .iter()
                .filter(|p| p.links_to(hash))
                .map(|p| p.post_hash)
                .collect();
            if !children.is_empty() {
                index.insert(*hash, children);
            }
        }
        Ok(index)
    }

    async fn request_posts(
        &self,
        channel: &str,
        since: Timestamp,
        until: Timestamp,
        ttl: u8,
        limit: usize,
    ) -> StoreResult<()> {
        self.record(RecordedRequest::Posts {
            channel: channel.to_string(),
            since,
            until,
            ttl,
            limit,
        });
        if self.state.lock().unwrap().fail_post_requests {
            return Err(StoreError::Request("post requests disabled".to_string()));
        }
        Ok(())
    }

    async fn request_state(&self, channel: &str, ttl: u8, hops: u32) -> StoreResult<()> {
        self.record(RecordedRequest::State { channel: channel.to_string(), ttl, hops });
        Ok(())
    }

    async fn request_moderation(
        &self,
        ttl: u8,
        channels: &[String],
        hops: u32,
        since: Timestamp,
    ) -> StoreResult<()> {
        self.record(RecordedRequest::Moderation { ttl, channels: channels.to_vec(), hops, since });
        Ok(())
    }

    async fn request_channels(&self, ttl: u8, offset: usize, limit: usize) -> StoreResult<()> {
        self.record(RecordedRequest::Channels { ttl, offset, limit });
        Ok(())
    }

    async fn joined_channels(&self) -> StoreResult<Vec<String>> {
        let state = self.state.lock().unwrap();
        if state.fail_joined_channels {
            return Err(StoreError::Unavailable("joined channel list disabled".to_string()));
        }
        Ok(state.joined.clone())
    }

    async fn known_channels(&self) -> StoreResult<Vec<String>> {
        let state = self.state.lock().unwrap();
        if state.fail_known_channels {
            return Err(StoreError::Unavailable("known channel list disabled".to_string()));
        }
        Ok(state.known.clone())
    }

    async fn users_in_channel(&self, channel: &str) -> StoreResult<HashMap<PublicKey, UserInfo>> {
        Ok(self.state.lock().unwrap().users.get(channel).cloned().unwrap_or_default())
    }

    async fn topic(&self, channel: &str) -> StoreResult<String> {
        Ok(self.state.lock().unwrap().topics.get(channel).cloned().unwrap_or_default())
    }

    async fn all_roles(&self) -> StoreResult<RoleMap> {
        Ok(self.state.lock().unwrap().roles.clone())
    }

    async fn publish_join(&self, channel: &str) -> StoreResult<()> {
        {
            let mut state = self.state.lock().unwrap();
            if !state.joined.iter().any(|c| c == channel) {
                state.joined.push(channel.to_string());
            }
            if !state.known.iter().any(|c| c == channel) {
                state.known.push(channel.to_string());
            }
            state
                .users
                .entry(channel.to_string())
                .or_default()
                .entry(self.key)
                .or_default();
        }
        self.publish(Published::Join(channel.to_string()));
        Ok(())
    }

    async fn publish_leave(&self, channel: &str) -> StoreResult<()> {
        {
            let mut state = self.state.lock().unwrap();
            state.joined.retain(|c| c != channel);
            if let Some(users) = state.users.get_mut(channel) {
                users.remove(&self.key);
            }
        }
        self.publish(Published::Leave(channel.to_string()));
        Ok(())
    }

    async fn post_text(&self, channel: &str, text: &str) -> StoreResult<PostHash> {
        let post = {
            let state = self.state.lock().unwrap();
            let head = state
                .posts
                .iter()
                .filter(|p| p.channel == channel)
                .max_by_key(|p| p.timestamp);
            let mut builder = PostBuilder::text(channel, text)
                .timestamp(Timestamp::monotonic_now().as_millis())
                .author(self.key);
            if let Some(head) = head {
                builder = builder.link(head);
            }
            builder.build()
        };

        let hash = post.post_hash;
        self.add_post(post.clone());
        self.publish(Published::Text { channel: channel.to_string(), text: text.to_string() });
        self.emit(StoreEvent::ChatAdded {
            channel: channel.to_string(),
            hash,
            post,
            public_key: self.key,
        });
        Ok(hash)
    }

    async fn set_topic(&self, channel: &str, topic: &str) -> StoreResult<()> {
        self.set_topic_text(channel, topic);
        self.publish(Published::Topic { channel: channel.to_string(), topic: topic.to_string() });
        self.emit(StoreEvent::TopicChanged {
            channel: channel.to_string(),
            topic: topic.to_string(),
            public_key: self.key,
        });
        Ok(())
    }

    async fn set_name(&self, name: &str) -> StoreResult<()> {
        {
            let mut state = self.state.lock().unwrap();
            for users in state.users.values_mut() {
                if let Some(info) = users.get_mut(&self.key) {
                    info.name = name.to_string();
                }
            }
        }
        self.publish(Published::Name(name.to_string()));
        self.emit(StoreEvent::NameChanged { public_key: self.key, name: name.to_string() });
        Ok(())
    }
}
