//! Cable Client - facade over channel state, replication and readiness
//!
//! # Responsibilities
//!
//! - **Bootstrap**: event subscription, client state and protocol requests,
//!   each converging on the readiness barrier
//! - **Channels**: join/leave/focus, topics, members, unread tracking
//! - **Timeline**: causally ordered pages with virtual messages
//! - **Publishing**: thin passthroughs to the store
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │             CableClient              │
//! └────┬──────────┬───────────┬──────────┘
//!      │          │           │
//!      ▼          ▼           ▼
//!  ChannelState Scheduler  Readiness
//!      │          │
//!      ▼          ▼
//!        CableStore (trait)
//! ```

use super::user::User;
use crate::config::Config;
use crate::core_channel::{fetch_ordered, ChannelDetails, ChannelInfo, PageOptions, RenderableMessage};
use crate::core_post::{Post, PostHash, PublicKey};
use crate::core_replication::ReplicationScheduler;
use crate::core_store::{RoleMap, SharedStore, StoreResult};
use crate::readiness::{Proceed, ReadinessBarrier};
use crate::shutdown::ShutdownCoordinator;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, RwLock};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

/// Capacity of the client event channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Notification for the UI layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    /// Client state changed; re-render
    Update,
    /// The readiness barrier opened
    Ready,
}

/// Channel and roster state, mutated only by the client itself
pub(crate) struct ClientState {
    pub(crate) channels: BTreeMap<String, ChannelDetails>,
    pub(crate) users: HashMap<PublicKey, User>,
    pub(crate) current_channel: Option<String>,
}

impl ClientState {
    fn new(local_key: PublicKey) -> Self {
        let mut users = HashMap::new();
        users.insert(local_key, User::new(local_key));
        Self {
            channels: BTreeMap::new(),
            users,
            current_channel: None,
        }
    }

    /// Get or lazily create a channel
    pub(crate) fn channel_mut(&mut self, name: &str) -> &mut ChannelDetails {
        self.channels
            .entry(name.to_string())
            .or_insert_with(|| ChannelDetails::new(name))
    }

    /// Get or lazily create a user
    pub(crate) fn user_mut(&mut self, key: PublicKey) -> &mut User {
        self.users.entry(key).or_insert_with(|| User::new(key))
    }

    pub(crate) fn display_name(&mut self, key: PublicKey) -> String {
        self.user_mut(key).display_name()
    }

    pub(crate) fn set_roles(&mut self, roles: RoleMap) {
        for (key, contexts) in roles {
            self.user_mut(key).roles = contexts;
        }
    }

    /// Move the single focus flag to `name`. Unknown channels are ignored.
    fn focus(&mut self, name: &str) -> bool {
        if !self.channels.contains_key(name) {
            return false;
        }
        if let Some(current) = self.current_channel.take() {
            if let Some(channel) = self.channels.get_mut(&current) {
                channel.unfocus();
            }
        }
        if let Some(channel) = self.channels.get_mut(name) {
            channel.focus();
        }
        self.current_channel = Some(name.to_string());
        true
    }
}

/// Client-side reconciliation layer for one cable identity
///
/// Cheap to clone; clones share state. A client's readiness barrier fires
/// once; build a new client for a fresh one.
#[derive(Clone)]
pub struct CableClient {
    store: SharedStore,
    config: Arc<Config>,
    local_key: PublicKey,
    pub(crate) state: Arc<RwLock<ClientState>>,
    pub(crate) scheduler: ReplicationScheduler,
    barrier: ReadinessBarrier,
    shutdown: ShutdownCoordinator,
    events_tx: broadcast::Sender<ClientEvent>,
    started: Arc<AtomicBool>,
    pub(crate) moderation_loaded: Arc<AtomicBool>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl CableClient {
    /// Create a client over `store`. Nothing is requested until [`CableClient::start`].
    pub fn new(store: SharedStore, config: Config) -> Self {
        let local_key = store.local_key();
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let barrier = ReadinessBarrier::new();
        let scheduler = ReplicationScheduler::new(store.clone(), config.replication.clone());

        let ready_tx = events_tx.clone();
        barrier.on_ready(move || {
            let _ = ready_tx.send(ClientEvent::Ready);
        });

        info!(local_key = %local_key.short(), "Creating CableClient");

        Self {
            store,
            config: Arc::new(config),
            local_key,
            state: Arc::new(RwLock::new(ClientState::new(local_key))),
            scheduler,
            barrier,
            shutdown: ShutdownCoordinator::new(),
            events_tx,
            started: Arc::new(AtomicBool::new(false)),
            moderation_loaded: Arc::new(AtomicBool::new(false)),
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn local_key(&self) -> PublicKey {
        self.local_key
    }

    /// Subscribe to UI notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events_tx.subscribe()
    }

    pub(crate) fn emit(&self, event: ClientEvent) {
        // No subscribers is fine
        let _ = self.events_tx.send(event);
    }

    fn track_task(&self, handle: JoinHandle<()>) {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }

    /// Register event handling, load client state and run the protocol
    /// bootstrap. Later calls are no-ops.
    pub async fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("CableClient already started");
            return;
        }
        let root = self.barrier.wait("new cable client instance");

        let events = self.barrier.wait("register events");
        self.spawn_event_loop();
        events.proceed();

        tokio::join!(self.initialize_client(), self.scheduler.bootstrap(&self.barrier));

        let renewal = self.scheduler.spawn_channel_list_renewal(&self.shutdown);
        self.track_task(renewal);
        root.proceed();
    }

    fn spawn_event_loop(&self) {
        let mut events = self.store.subscribe();
        let mut shutdown_rx = self.shutdown.subscribe();
        let client = self.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Ok(event) => client.handle_event(event).await,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Store event stream lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!("Store event stream closed");
                            break;
                        }
                    },
                    _ = shutdown_rx.recv() => break,
                }
            }
            debug!("Event loop stopped");
        });
        self.track_task(handle);
    }

    /// Populate joined channels, pick the focused channel, load topics,
    /// members and roles
    async fn initialize_client(&self) {
        let slot = self.barrier.wait("initialize client");
        let default_channel = self.config.client.default_channel.clone();

        let mut joined = match self.store.joined_channels().await {
            Ok(channels) => channels,
            Err(e) => {
                warn!(error = %e, "Failed to get joined channels");
                return;
            }
        };

        if joined.is_empty() {
            info!(channel = %default_channel, "No joined channels, joining default");
            self.join(&default_channel, false).await;
            joined.push(default_channel.clone());
        }
        joined.sort();
        joined.dedup();

        {
            let mut state = self.state.write().await;
            for channel in &joined {
                state.channel_mut(channel).join();
            }
        }

        let focus = if joined.contains(&default_channel) {
            default_channel
        } else {
            joined[0].clone()
        };
        self.focus(&focus).await;

        let mut loads = JoinSet::new();
        for channel in joined {
            let proceed = self.barrier.wait(format!("joined channel {}", channel));
            let client = self.clone();
            loads.spawn(async move { client.load_joined_channel(channel, proceed).await });
        }
        while let Some(result) = loads.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Joined channel load task failed");
            }
        }

        self.load_roles().await;
        slot.proceed();
    }

    async fn load_joined_channel(&self, channel: String, proceed: Proceed) {
        let (topic, users) = tokio::join!(
            self.store.topic(&channel),
            self.store.users_in_channel(&channel)
        );

        {
            let mut state = self.state.write().await;
            match topic {
                Ok(topic) => state.channel_mut(&channel).set_topic(topic),
                Err(e) => warn!(channel = %channel, error = %e, "Failed to get topic"),
            }
            match users {
                Ok(users) => {
                    for (key, info) in users {
                        state.user_mut(key).update(&info);
                        state.channel_mut(&channel).add_member(key);
                    }
                }
                Err(e) => warn!(channel = %channel, error = %e, "Failed to get channel members"),
            }
        }

        debug!(channel = %channel, "Joined channel loaded");
        self.emit(ClientEvent::Update);
        proceed.proceed();
    }

    async fn load_roles(&self) {
        match self.store.all_roles().await {
            Ok(roles) => self.state.write().await.set_roles(roles),
            Err(e) => warn!(error = %e, "Failed to get roles"),
        }
    }

    /// Run `callback` once the client is ready
    pub fn on_ready<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.barrier.on_ready(callback);
    }

    /// Resolve once the client is ready
    pub async fn ready(&self) {
        self.barrier.ready().await;
    }

    pub fn is_ready(&self) -> bool {
        self.barrier.is_ready()
    }

    /// Stop background loops and wait for them to finish
    pub async fn shutdown(&self) {
        self.shutdown.shutdown().await;
        let handles: Vec<JoinHandle<()>> = std::mem::take(
            &mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }
        info!("CableClient shut down");
    }

    /* channels */

    /// Focus a known channel, unfocusing the previous one
    pub async fn focus(&self, channel: &str) -> bool {
        let focused = self.state.write().await.focus(channel);
        if focused {
            debug!(channel = %channel, "Focus channel");
        }
        focused
    }

    /// Join `channel`. Returns false if it was already joined.
    pub async fn join(&self, channel: &str, focus: bool) -> bool {
        let already_joined = self.state.write().await.channel_mut(channel).join();
        if already_joined {
            return false;
        }
        info!(channel = %channel, "Join channel");
        if focus {
            self.focus(channel).await;
        }

        if let Err(e) = self.store.publish_join(channel).await {
            warn!(channel = %channel, error = %e, "Failed to publish join");
        }
        self.scheduler.on_join(channel).await;

        match self.store.users_in_channel(channel).await {
            Ok(users) => {
                let mut state = self.state.write().await;
                for (key, info) in users {
                    state.user_mut(key).update(&info);
                    state.channel_mut(channel).add_member(key);
                }
            }
            Err(e) => warn!(channel = %channel, error = %e, "Failed to get channel members"),
        }

        self.emit(ClientEvent::Update);
        true
    }

    /// Leave `channel`. Returns whether it was joined. Focus stays where it
    /// is, even when `channel` was the focused one.
    pub async fn leave(&self, channel: &str) -> bool {
        let was_joined = {
            let mut state = self.state.write().await;
            match state.channels.get_mut(channel) {
                Some(details) => details.leave(),
                None => return false,
            }
        };
        if !was_joined {
            return false;
        }
        info!(channel = %channel, "Leave channel");

        if let Err(e) = self.store.publish_leave(channel).await {
            warn!(channel = %channel, error = %e, "Failed to publish leave");
        }
        self.scheduler.on_leave(channel);
        self.emit(ClientEvent::Update);
        true
    }

    /// Every known channel, sorted
    pub async fn get_all_channels(&self) -> Vec<String> {
        self.state.read().await.channels.keys().cloned().collect()
    }

    /// Joined channels, sorted
    pub async fn get_joined_channels(&self) -> Vec<String> {
        self.state
            .read()
            .await
            .channels
            .values()
            .filter(|c| c.is_joined())
            .map(|c| c.name().to_string())
            .collect()
    }

    pub async fn get_current_channel(&self) -> Option<String> {
        self.state.read().await.current_channel.clone()
    }

    pub async fn channel_info(&self, channel: &str) -> Option<ChannelInfo> {
        self.state.read().await.channels.get(channel).map(|c| c.info())
    }

    /// Topic of `channel`, empty if unknown
    pub async fn topic(&self, channel: &str) -> String {
        self.state
            .read()
            .await
            .channels
            .get(channel)
            .map(|c| c.topic().to_string())
            .unwrap_or_default()
    }

    /// Copy of every known user
    pub async fn users(&self) -> HashMap<PublicKey, User> {
        self.state.read().await.users.clone()
    }

    /// Members of `channel` (the current channel if `None`)
    pub async fn channel_members(&self, channel: Option<&str>) -> HashMap<PublicKey, User> {
        let state = self.state.read().await;
        let name = match channel.map(str::to_string).or_else(|| state.current_channel.clone()) {
            Some(name) => name,
            None => return HashMap::new(),
        };
        let Some(details) = state.channels.get(&name) else {
            return HashMap::new();
        };
        details
            .members()
            .into_iter()
            .map(|key| {
                let user = state.users.get(&key).cloned().unwrap_or_else(|| User::new(key));
                (key, user)
            })
            .collect()
    }

    pub async fn local_user(&self) -> User {
        self.state
            .read()
            .await
            .users
            .get(&self.local_key)
            .cloned()
            .unwrap_or_else(|| User::new(self.local_key))
    }

    pub async fn mark_as_read(&self, channel: &str) -> bool {
        let mut state = self.state.write().await;
        match state.channels.get_mut(channel) {
            Some(details) => {
                details.mark_as_read();
                true
            }
            None => false,
        }
    }

    pub async fn mark_as_unread(&self, channel: &str) -> bool {
        let mut state = self.state.write().await;
        match state.channels.get_mut(channel) {
            Some(details) => {
                details.mark_as_unread();
                true
            }
            None => false,
        }
    }

    pub async fn new_message_count(&self, channel: &str) -> usize {
        self.state
            .read()
            .await
            .channels
            .get(channel)
            .map(|c| c.new_message_count())
            .unwrap_or(0)
    }

    pub async fn mentions(&self, channel: &str) -> Vec<Post> {
        self.state
            .read()
            .await
            .channels
            .get(channel)
            .map(|c| c.mentions())
            .unwrap_or_default()
    }

    /* timeline */

    /// A causally ordered page of `channel` with its virtual messages merged
    /// in. Unknown channels and store failures give an empty page.
    pub async fn get_page(&self, channel: &str, opts: PageOptions) -> Vec<RenderableMessage> {
        if !self.state.read().await.channels.contains_key(channel) {
            return Vec::new();
        }
        let default_limit = self.config.client.page_limit;
        let ordered = fetch_ordered(self.store.as_ref(), channel, &opts, default_limit).await;

        let mut state = self.state.write().await;
        match state.channels.get_mut(channel) {
            Some(details) => details.render_page(ordered, &opts, default_limit),
            None => Vec::new(),
        }
    }

    /// Add a status notice to `channel` (the current channel if `None`)
    pub async fn add_status_message(&self, text: &str, channel: Option<&str>) -> bool {
        let added = {
            let mut state = self.state.write().await;
            let name = match channel.map(str::to_string).or_else(|| state.current_channel.clone()) {
                Some(name) => name,
                None => return false,
            };
            match state.channels.get_mut(&name) {
                Some(details) => {
                    details.add_status_message(text, None);
                    debug!(channel = %name, text = %text, "Status message");
                    true
                }
                None => false,
            }
        };
        if added {
            self.emit(ClientEvent::Update);
        }
        added
    }

    pub async fn clear_status_messages(&self, channel: &str) -> bool {
        let cleared = match self.state.write().await.channels.get_mut(channel) {
            Some(details) => {
                details.clear_status_messages();
                true
            }
            None => false,
        };
        if cleared {
            self.emit(ClientEvent::Update);
        }
        cleared
    }

    /* publishing */

    pub async fn post_text(&self, channel: &str, text: &str) -> StoreResult<PostHash> {
        let hash = self.store.post_text(channel, text).await?;
        debug!(channel = %channel, hash = %hash, "Posted text");
        self.emit(ClientEvent::Update);
        Ok(hash)
    }

    pub async fn set_topic(&self, channel: &str, topic: &str) -> StoreResult<()> {
        self.store.set_topic(channel, topic).await?;
        self.state.write().await.channel_mut(channel).set_topic(topic);
        self.emit(ClientEvent::Update);
        Ok(())
    }

    pub async fn set_name(&self, name: &str) -> StoreResult<()> {
        self.store.set_name(name).await?;
        self.state.write().await.user_mut(self.local_key).name = name.to_string();
        self.emit(ClientEvent::Update);
        Ok(())
    }
}

impl std::fmt::Debug for CableClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CableClient")
            .field("local_key", &self.local_key)
            .field("barrier", &self.barrier)
            .finish()
    }
}
