/*
    virtual_message.rs - Synthetic, channel-local timeline entries

    Virtual messages are created by channel state for local rendering only:
    status notices and date separators. They are never persisted, never
    replicated and never causally linked.
*/

use crate::core_post::{Post, PostHash, PublicKey, Timestamp};
use serde::{Deserialize, Serialize};

/// Kind of a virtual message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VirtualKind {
    /// Free-form status notice
    StatusGeneral,
    /// Day separator, stamped at the start of the UTC day
    StatusDateChanged,
}

impl VirtualKind {
    /// Negative post type code, kept apart from real post types
    pub fn code(&self) -> i8 {
        match self {
            VirtualKind::StatusGeneral => -1,
            VirtualKind::StatusDateChanged => -2,
        }
    }
}

/// A synthetic timeline entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualMessage {
    pub kind: VirtualKind,
    pub channel: String,
    pub timestamp: Timestamp,
    pub text: String,
}

impl VirtualMessage {
    /// Status notice; without a timestamp it is stamped with a process-monotonic now
    pub fn status(channel: &str, text: impl Into<String>, timestamp: Option<Timestamp>) -> Self {
        Self {
            kind: VirtualKind::StatusGeneral,
            channel: channel.to_string(),
            timestamp: timestamp.unwrap_or_else(Timestamp::monotonic_now),
            text: text.into(),
        }
    }

    /// Date separator for the day starting at `day`
    pub fn date_changed(channel: &str, day: Timestamp) -> Self {
        Self {
            kind: VirtualKind::StatusDateChanged,
            channel: channel.to_string(),
            timestamp: day,
            text: String::new(),
        }
    }
}

/// One entry of a rendered page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderableMessage {
    Post(Post),
    Virtual(VirtualMessage),
}

impl RenderableMessage {
    pub fn timestamp(&self) -> Timestamp {
        match self {
            RenderableMessage::Post(post) => post.timestamp,
            RenderableMessage::Virtual(msg) => msg.timestamp,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            RenderableMessage::Post(post) => &post.text,
            RenderableMessage::Virtual(msg) => &msg.text,
        }
    }

    /// Author key; virtual messages have none
    pub fn public_key(&self) -> Option<PublicKey> {
        match self {
            RenderableMessage::Post(post) => Some(post.public_key),
            RenderableMessage::Virtual(_) => None,
        }
    }

    pub fn post_hash(&self) -> Option<PostHash> {
        self.as_post().map(|p| p.post_hash)
    }

    pub fn as_post(&self) -> Option<&Post> {
        match self {
            RenderableMessage::Post(post) => Some(post),
            RenderableMessage::Virtual(_) => None,
        }
    }

    pub fn as_virtual(&self) -> Option<&VirtualMessage> {
        match self {
            RenderableMessage::Post(_) => None,
            RenderableMessage::Virtual(msg) => Some(msg),
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, RenderableMessage::Virtual(_))
    }
}

impl From<Post> for RenderableMessage {
    fn from(post: Post) -> Self {
        RenderableMessage::Post(post)
    }
}

impl From<VirtualMessage> for RenderableMessage {
    fn from(msg: VirtualMessage) -> Self {
        RenderableMessage::Virtual(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_messages_keep_creation_order() {
        let a = VirtualMessage::status("default", "first", None);
        let b = VirtualMessage::status("default", "second", None);
        assert!(a.timestamp < b.timestamp);
        assert_eq!(a.kind.code(), -1);
    }

    #[test]
    fn test_renderable_accessors() {
        let msg: RenderableMessage = VirtualMessage::date_changed("default", Timestamp(86_400_000)).into();
        assert!(msg.is_virtual());
        assert_eq!(msg.timestamp(), Timestamp(86_400_000));
        assert_eq!(msg.public_key(), None);
        assert_eq!(msg.post_hash(), None);
        assert_eq!(msg.as_virtual().map(|m| m.kind), Some(VirtualKind::StatusDateChanged));
    }
}
