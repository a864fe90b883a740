//! Channel state
//!
//! One [`ChannelDetails`] per channel name, created on first reference and
//! kept for the lifetime of the client. Holds membership, topic, join/focus
//! flags, unread and mention tracking, and the channel's virtual messages.

use super::page::PageOptions;
use super::virtual_message::{RenderableMessage, VirtualKind, VirtualMessage};
use crate::core_post::{Post, PublicKey, Timestamp};
use std::collections::{BTreeSet, HashSet};
use tracing::trace;

/// Copy of a channel's state handed to callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub name: String,
    pub topic: String,
    pub joined: bool,
    pub focused: bool,
    pub members: BTreeSet<PublicKey>,
    pub mentions: Vec<Post>,
    pub new_message_count: usize,
    pub last_read: Timestamp,
}

/// Per-channel state
#[derive(Debug, Clone)]
pub struct ChannelDetails {
    name: String,
    joined: bool,
    focused: bool,
    topic: String,
    members: BTreeSet<PublicKey>,
    mentions: Vec<Post>,
    virtual_messages: Vec<VirtualMessage>,
    new_message_count: usize,
    dates_seen: HashSet<Timestamp>,
    last_read: Timestamp,
}

impl ChannelDetails {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            joined: false,
            focused: false,
            topic: String::new(),
            members: BTreeSet::new(),
            mentions: Vec::new(),
            virtual_messages: Vec::new(),
            new_message_count: 0,
            dates_seen: HashSet::new(),
            last_read: Timestamp(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self) -> ChannelInfo {
        ChannelInfo {
            name: self.name.clone(),
            topic: self.topic.clone(),
            joined: self.joined,
            focused: self.focused,
            members: self.members.clone(),
            mentions: self.mentions.clone(),
            new_message_count: self.new_message_count,
            last_read: self.last_read,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn set_topic(&mut self, topic: impl Into<String>) {
        self.topic = topic.into();
    }

    /// Returns whether the key was newly added
    pub fn add_member(&mut self, key: PublicKey) -> bool {
        self.members.insert(key)
    }

    /// Returns whether the key was present
    pub fn remove_member(&mut self, key: &PublicKey) -> bool {
        self.members.remove(key)
    }

    pub fn is_member(&self, key: &PublicKey) -> bool {
        self.members.contains(key)
    }

    pub fn members(&self) -> Vec<PublicKey> {
        self.members.iter().copied().collect()
    }

    /// Record a mention; ignored while the channel is focused
    pub fn add_mention(&mut self, post: Post) {
        if !self.focused {
            self.mentions.push(post);
        }
    }

    pub fn mentions(&self) -> Vec<Post> {
        self.mentions.clone()
    }

    /// Count a new post as unread unless the channel is focused
    pub fn handle_message(&mut self) {
        if !self.focused {
            self.new_message_count += 1;
        }
    }

    pub fn new_message_count(&self) -> usize {
        self.new_message_count
    }

    pub fn last_read(&self) -> Timestamp {
        self.last_read
    }

    pub fn mark_as_read(&mut self) {
        self.last_read = Timestamp::now();
        self.new_message_count = 0;
        self.mentions.clear();
    }

    pub fn mark_as_unread(&mut self) {
        self.last_read = Timestamp::now();
        self.new_message_count = 1;
    }

    pub fn focus(&mut self) {
        self.focused = true;
    }

    pub fn unfocus(&mut self) {
        self.focused = false;
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// Mark joined; returns whether the channel was already joined
    pub fn join(&mut self) -> bool {
        std::mem::replace(&mut self.joined, true)
    }

    /// Mark left; returns whether the channel was joined
    pub fn leave(&mut self) -> bool {
        std::mem::replace(&mut self.joined, false)
    }

    pub fn is_joined(&self) -> bool {
        self.joined
    }

    pub fn add_virtual_message(&mut self, msg: VirtualMessage) {
        self.virtual_messages.push(msg);
    }

    /// Append a status notice, stamped now unless `timestamp` is given
    pub fn add_status_message(&mut self, text: impl Into<String>, timestamp: Option<Timestamp>) {
        let msg = VirtualMessage::status(&self.name, text, timestamp);
        self.add_virtual_message(msg);
    }

    /// Drop status notices. Date separators stay: a day is only marked once.
    pub fn clear_status_messages(&mut self) {
        self.virtual_messages
            .retain(|m| m.kind == VirtualKind::StatusDateChanged);
    }

    /// Virtual messages strictly inside the window, oldest first, at most `limit`
    pub fn virtual_messages(&self, opts: &PageOptions, limit: usize) -> Vec<VirtualMessage> {
        let mut filtered: Vec<VirtualMessage> = self
            .virtual_messages
            .iter()
            .filter(|m| opts.contains(m.timestamp))
            .cloned()
            .collect();
        filtered.sort_by_key(|m| m.timestamp);
        keep_last(&mut filtered, limit);
        filtered
    }

    /// Add a date separator for every day bucket not seen before.
    /// Walks newest to oldest; returns the number of separators added.
    pub fn record_dates(&mut self, posts: &[Post]) -> usize {
        let mut added = 0;
        for post in posts.iter().rev() {
            let day = post.timestamp.day_bucket();
            if self.dates_seen.insert(day) {
                trace!(channel = %self.name, day = %day, "New day marker");
                let marker = VirtualMessage::date_changed(&self.name, day);
                self.virtual_messages.push(marker);
                added += 1;
            }
        }
        added
    }

    /// Turn a causally ordered batch into a page: add day markers, merge in
    /// the window's virtual messages, order by timestamp and keep the most
    /// recent `limit` entries. Entries with equal timestamps keep virtual
    /// messages first, then causal order.
    pub fn render_page(
        &mut self,
        ordered: Vec<Post>,
        opts: &PageOptions,
        default_limit: usize,
    ) -> Vec<RenderableMessage> {
        let limit = opts.effective_limit(default_limit);
        self.record_dates(&ordered);

        let mut page: Vec<RenderableMessage> = self
            .virtual_messages(opts, limit)
            .into_iter()
            .map(RenderableMessage::Virtual)
            .chain(ordered.into_iter().map(RenderableMessage::Post))
            .collect();
        // Stable: ties keep their relative order
        page.sort_by_key(|m| m.timestamp());
        keep_last(&mut page, limit);
        page
    }
}

fn keep_last<T>(items: &mut Vec<T>, limit: usize) {
    if items.len() > limit {
        items.drain(..items.len() - limit);
    }
}
