//! Replication Scheduler
//!
//! Decides what to ask peers for and when. At startup it backfills every
//! joined and known channel under the policy matching its class, asks for
//! channel state and moderation state, and requests the channel list; the
//! channel-list request is then renewed on a fixed interval.
//!
//! Requests are fire-and-forget. A failed request is logged and counted but
//! never aborts sibling requests.

use super::policy::{ChannelClass, PolicyTable, ReplicationPolicy};
use crate::config::ReplicationConfig;
use crate::core_post::Timestamp;
use crate::core_store::{SharedStore, StoreResult};
use crate::metrics::{record_request, RequestKind};
use crate::readiness::ReadinessBarrier;
use crate::shutdown::ShutdownCoordinator;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Issues replication requests according to the policy table
#[derive(Clone)]
pub struct ReplicationScheduler {
    store: SharedStore,
    config: ReplicationConfig,
    /// Channels explicitly left during this process
    dropped: Arc<Mutex<HashSet<String>>>,
}

impl ReplicationScheduler {
    pub fn new(store: SharedStore, config: ReplicationConfig) -> Self {
        Self {
            store,
            config,
            dropped: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    pub fn policies(&self) -> &PolicyTable {
        &self.config.policies
    }

    fn dropped(&self) -> MutexGuard<'_, HashSet<String>> {
        self.dropped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Classify a channel. An explicit leave wins over membership reports.
    pub fn classify(&self, channel: &str, joined: bool) -> ChannelClass {
        if self.dropped().contains(channel) {
            ChannelClass::Dropped
        } else if joined {
            ChannelClass::Joined
        } else {
            ChannelClass::Unjoined
        }
    }

    pub fn policy_for(&self, channel: &str, joined: bool) -> ReplicationPolicy {
        self.config.policies.policy_for(self.classify(channel, joined))
    }

    /// Run the startup requests. The joined, known-channel and channel-list
    /// sub-steps run concurrently, each holding its own barrier slot, so a
    /// failed lookup only ends the sub-step that needed it.
    pub async fn bootstrap(&self, barrier: &ReadinessBarrier) {
        let joined_slot = barrier.wait("init protocol: joined");
        let known_slot = barrier.wait("init protocol: all channels");
        let list_slot = barrier.wait("init protocol: channel list request");

        let joined = async {
            self.bootstrap_joined().await;
            joined_slot.proceed();
        };
        let known = async {
            self.bootstrap_known().await;
            known_slot.proceed();
        };
        let list = async {
            self.request_channel_list().await;
            list_slot.proceed();
        };
        tokio::join!(joined, known, list);
    }

    /// Backfill every joined channel and request moderation state for all of
    /// them in one call
    async fn bootstrap_joined(&self) {
        let joined = match self.store.joined_channels().await {
            Ok(channels) => channels,
            Err(e) => {
                warn!(error = %e, "Failed to get joined channels");
                return;
            }
        };
        debug!(channels = ?joined, "Joined channels");

        for channel in &joined {
            self.backfill(channel, true).await;
        }

        if !joined.is_empty() {
            let since = self.config.policies.joined.since(Timestamp::now());
            self.request_moderation(&joined, since).await;
        }
    }

    /// State for every known channel, then an unjoined backfill for the known
    /// channels that are not joined. Without a joined list only the backfill
    /// is skipped.
    async fn bootstrap_known(&self) {
        let known = match self.store.known_channels().await {
            Ok(channels) => channels,
            Err(e) => {
                warn!(error = %e, "Failed to get known channels");
                return;
            }
        };
        debug!(channels = ?known, "Known channels");

        for channel in &known {
            self.request_state(channel).await;
        }

        let joined = match self.store.joined_channels().await {
            Ok(channels) => channels,
            Err(e) => {
                warn!(error = %e, "Skipping unjoined backfill without a joined channel list");
                return;
            }
        };
        for channel in known.iter().filter(|c| !joined.contains(c)) {
            self.backfill(channel, false).await;
        }
    }

    /// Bootstrap a single newly discovered channel: state, backfill and moderation
    pub async fn bootstrap_channel(&self, channel: &str, joined: bool) {
        debug!(channel = %channel, joined, "Bootstrapping new channel");
        self.request_state(channel).await;

        let policy = self.policy_for(channel, joined);
        self.backfill(channel, joined).await;
        if policy.replicates() {
            self.request_moderation(&[channel.to_string()], policy.since(Timestamp::now()))
                .await;
        }
    }

    /// Clear any dropped mark and backfill right away under the joined policy
    pub async fn on_join(&self, channel: &str) {
        self.dropped().remove(channel);
        self.backfill(channel, true).await;
    }

    /// Stop replicating posts for `channel`
    pub fn on_leave(&self, channel: &str) {
        if self.dropped().insert(channel.to_string()) {
            debug!(channel = %channel, "Channel dropped from replication");
        }
    }

    /// Issue a post backfill request for `channel` if its policy replicates.
    /// Returns whether a request was issued.
    pub async fn backfill(&self, channel: &str, joined: bool) -> bool {
        let class = self.classify(channel, joined);
        let policy = self.config.policies.policy_for(class);
        if !policy.replicates() {
            debug!(channel = %channel, class = %class, "No backfill");
            return false;
        }

        let since = policy.since(Timestamp::now());
        debug!(channel = %channel, class = %class, since = %since, limit = policy.limit, "Request posts");
        let result = self
            .store
            .request_posts(channel, since, Timestamp(0), self.config.ttl, policy.limit)
            .await;
        self.track(RequestKind::Posts, channel, result)
    }

    async fn request_state(&self, channel: &str) {
        let result = self.store.request_state(channel, self.config.ttl, self.config.hops).await;
        self.track(RequestKind::State, channel, result);
    }

    async fn request_moderation(&self, channels: &[String], since: Timestamp) {
        let result = self
            .store
            .request_moderation(self.config.ttl, channels, self.config.hops, since)
            .await;
        self.track(RequestKind::Moderation, &channels.join(","), result);
    }

    /// Ask peers for the channel list
    pub async fn request_channel_list(&self) {
        let result = self
            .store
            .request_channels(self.config.ttl, 0, self.config.channel_list_limit)
            .await;
        self.track(RequestKind::Channels, "", result);
    }

    fn track(&self, kind: RequestKind, target: &str, result: StoreResult<()>) -> bool {
        match result {
            Ok(()) => {
                record_request(kind, true);
                true
            }
            Err(e) => {
                warn!(kind = ?kind, target = %target, error = %e, "Replication request failed");
                record_request(kind, false);
                false
            }
        }
    }

    /// Re-request the channel list every renewal interval until shutdown.
    /// The first renewal fires one full interval from now.
    pub fn spawn_channel_list_renewal(&self, shutdown: &ShutdownCoordinator) -> JoinHandle<()> {
        let scheduler = self.clone();
        let period = self.config.channel_list_renewal_interval;
        let mut shutdown_rx = shutdown.subscribe();

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        debug!("Periodic channel list request");
                        scheduler.request_channel_list().await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Channel list renewal stopped");
                        break;
                    }
                }
            }
        })
    }
}
