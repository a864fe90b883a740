//! Store event handling
//!
//! The client registers one handler per [`StoreEvent`] variant. Handlers make
//! sure referenced users and channels exist, apply the change to client state
//! and notify the UI with [`ClientEvent::Update`].

use super::client::{CableClient, ClientEvent};
use crate::core_post::{Post, PublicKey};
use crate::core_store::{ModerationKind, StoreEvent};
use std::sync::atomic::Ordering;
use tracing::{debug, trace};

/// Above this many recipients a moderation notice gives a count, not names
const MAX_NAMED_RECIPIENTS: usize = 4;

impl CableClient {
    pub(crate) async fn handle_event(&self, event: StoreEvent) {
        trace!(event = event.name(), "Store event");
        let handled = match event {
            StoreEvent::ChatAdded { channel, post, public_key, .. } => {
                self.on_chat_added(channel, post, public_key).await;
                true
            }
            StoreEvent::ChatRemoved { channel, hash, public_key } => {
                let mut state = self.state.write().await;
                state.user_mut(public_key);
                state.channel_mut(&channel);
                debug!(channel = %channel, hash = %hash, "Post removed");
                true
            }
            StoreEvent::TopicChanged { channel, topic, public_key } => {
                let mut state = self.state.write().await;
                state.user_mut(public_key);
                debug!(channel = %channel, topic = %topic, "Topic changed");
                state.channel_mut(&channel).set_topic(topic);
                true
            }
            StoreEvent::MemberJoined { channel, public_key } => {
                let mut state = self.state.write().await;
                state.user_mut(public_key);
                state.channel_mut(&channel).add_member(public_key);
                true
            }
            StoreEvent::MemberLeft { channel, public_key } => {
                let mut state = self.state.write().await;
                state.user_mut(public_key);
                state.channel_mut(&channel).remove_member(&public_key);
                true
            }
            StoreEvent::ChannelsAdded { channels } => {
                self.on_channels_added(channels).await;
                true
            }
            StoreEvent::NameChanged { public_key, name } => {
                debug!(key = %public_key.short(), name = %name, "Name changed");
                self.state.write().await.user_mut(public_key).name = name;
                true
            }
            StoreEvent::RolesUpdated(roles) => {
                self.state.write().await.set_roles(roles);
                true
            }
            StoreEvent::ModerationAction { public_key, kind, recipients, reason, channel } => {
                self.on_moderation_action(public_key, kind, &recipients, &reason, channel.as_deref())
                    .await
            }
            StoreEvent::ModerationInit => !self.moderation_loaded.swap(true, Ordering::SeqCst),
        };

        if handled {
            self.emit(ClientEvent::Update);
        }
    }

    async fn on_chat_added(&self, channel: String, post: Post, author: PublicKey) {
        let mut state = self.state.write().await;
        state.user_mut(author);
        let local_name = state.display_name(self.local_key());

        let details = state.channel_mut(&channel);
        details.handle_message();
        if author != self.local_key() && mentions(&post.text, &local_name) {
            debug!(channel = %channel, hash = %post.post_hash, "Mention");
            details.add_mention(post);
        }
    }

    /// Bootstrap every channel not seen before
    async fn on_channels_added(&self, channels: Vec<String>) {
        let fresh: Vec<String> = {
            let mut state = self.state.write().await;
            channels
                .into_iter()
                .filter(|name| {
                    if state.channels.contains_key(name) {
                        false
                    } else {
                        state.channel_mut(name);
                        true
                    }
                })
                .collect()
        };

        for channel in &fresh {
            self.scheduler.bootstrap_channel(channel, false).await;
        }
        debug!(channels = ?fresh, "New channels");
    }

    /// Post a notice about someone else's moderation action to the current
    /// channel. Returns false for the local user's own actions.
    async fn on_moderation_action(
        &self,
        author: PublicKey,
        kind: ModerationKind,
        recipients: &[PublicKey],
        reason: &str,
        channel: Option<&str>,
    ) -> bool {
        if author == self.local_key() {
            return false;
        }

        let mut state = self.state.write().await;
        let author_name = state.display_name(author);
        let names: Vec<String> = recipients.iter().map(|key| state.display_name(*key)).collect();
        let text = moderation_notice(&author_name, kind, &names, reason, channel);

        let current = state.current_channel.clone();
        if let Some(details) = current.and_then(|name| state.channels.get_mut(&name)) {
            details.add_status_message(text, None);
        }
        true
    }
}

/// Whether `text` mentions `name`, ignoring case
pub fn mentions(text: &str, name: &str) -> bool {
    !name.is_empty() && text.to_lowercase().contains(&name.to_lowercase())
}

/// `<author> <verb> <names|N users> [in channel <ch> ][(reason: "<r>")]`
pub fn moderation_notice(
    author: &str,
    kind: ModerationKind,
    recipients: &[String],
    reason: &str,
    channel: Option<&str>,
) -> String {
    let targets = if recipients.len() > MAX_NAMED_RECIPIENTS {
        format!("{} users", recipients.len())
    } else {
        recipients.join(",")
    };
    let channel = match channel {
        Some(ch) if !ch.is_empty() => format!("in channel {} ", ch),
        _ => String::new(),
    };
    let reason = if reason.is_empty() {
        String::new()
    } else {
        format!("(reason: \"{}\")", reason)
    };

    format!("{} {} {} {}{}", author, kind.verb(), targets, channel, reason)
        .trim_end()
        .to_string()
}
