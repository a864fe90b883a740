//! Typed events delivered by the store after it processes posts

use crate::core_post::{Post, PostHash, PublicKey};
use std::collections::HashMap;

/// Role a user holds in a channel or cabal-wide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

/// Public key -> (context -> role). The cabal-wide context is the empty string.
pub type RoleMap = HashMap<PublicKey, HashMap<String, Role>>;

/// Kind of a moderation action on users
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationKind {
    HideUser,
    UnhideUser,
    Block,
    Unblock,
}

impl ModerationKind {
    /// Past-tense verb used in status notices
    pub fn verb(&self) -> &'static str {
        match self {
            ModerationKind::HideUser => "hid",
            ModerationKind::UnhideUser => "unhid",
            ModerationKind::Block => "blocked",
            ModerationKind::Unblock => "unblocked",
        }
    }
}

/// Event stream item. The store delivers these in order, once per process.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// post/text stored
    ChatAdded {
        channel: String,
        hash: PostHash,
        post: Post,
        public_key: PublicKey,
    },
    /// post/delete applied
    ChatRemoved {
        channel: String,
        hash: PostHash,
        public_key: PublicKey,
    },
    /// post/topic
    TopicChanged {
        channel: String,
        topic: String,
        public_key: PublicKey,
    },
    /// post/join
    MemberJoined { channel: String, public_key: PublicKey },
    /// post/leave
    MemberLeft { channel: String, public_key: PublicKey },
    /// Channel list response
    ChannelsAdded { channels: Vec<String> },
    /// post/info name change
    NameChanged { public_key: PublicKey, name: String },
    /// Role assignments recomputed
    RolesUpdated(RoleMap),
    /// post/moderation, post/block, post/unblock
    ModerationAction {
        public_key: PublicKey,
        kind: ModerationKind,
        recipients: Vec<PublicKey>,
        reason: String,
        channel: Option<String>,
    },
    /// Moderation state finished loading
    ModerationInit,
}

impl StoreEvent {
    /// Short event name for logs
    pub fn name(&self) -> &'static str {
        match self {
            StoreEvent::ChatAdded { .. } => "chat/add",
            StoreEvent::ChatRemoved { .. } => "chat/remove",
            StoreEvent::TopicChanged { .. } => "channels/topic",
            StoreEvent::MemberJoined { .. } => "channels/join",
            StoreEvent::MemberLeft { .. } => "channels/leave",
            StoreEvent::ChannelsAdded { .. } => "channels/add",
            StoreEvent::NameChanged { .. } => "users/name-changed",
            StoreEvent::RolesUpdated(_) => "moderation/roles-update",
            StoreEvent::ModerationAction { .. } => "moderation/action",
            StoreEvent::ModerationInit => "moderation/init",
        }
    }
}
