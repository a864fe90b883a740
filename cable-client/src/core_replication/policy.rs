//! Replication policies
//!
//! A policy is an immutable `(limit, window_size)` pair deciding how much
//! history to request for a class of channel.

use crate::core_post::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// 2 * 10 weeks
pub const DEFAULT_HISTORY_WINDOW: Duration = Duration::from_secs(2 * 10 * 7 * 24 * 60 * 60);

/// Post limit for channels we have not joined
pub const DEFAULT_UNJOINED_LIMIT: usize = 1000;

/// How much history to request for a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationPolicy {
    /// Maximum number of posts, 0 means unlimited
    pub limit: usize,

    /// How far back from now to request
    #[serde(with = "humantime_serde")]
    pub window_size: Duration,
}

impl ReplicationPolicy {
    pub const fn new(limit: usize, window_size: Duration) -> Self {
        Self { limit, window_size }
    }

    /// Unlimited posts over the long window
    pub const fn joined() -> Self {
        Self::new(0, DEFAULT_HISTORY_WINDOW)
    }

    /// A bounded preview over the long window
    pub const fn unjoined() -> Self {
        Self::new(DEFAULT_UNJOINED_LIMIT, DEFAULT_HISTORY_WINDOW)
    }

    /// Do not replicate
    pub const fn dropped() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Whether this policy asks for any posts at all
    pub fn replicates(&self) -> bool {
        !self.window_size.is_zero()
    }

    /// Start of the request window relative to `now`
    pub fn since(&self, now: Timestamp) -> Timestamp {
        now.saturating_sub(self.window_size)
    }
}

/// Replication class of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelClass {
    /// The local user is a member
    Joined,
    /// Known to exist, not joined
    Unjoined,
    /// Explicitly left; not replicated
    Dropped,
}

impl fmt::Display for ChannelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChannelClass::Joined => "joined",
            ChannelClass::Unjoined => "unjoined",
            ChannelClass::Dropped => "dropped",
        };
        write!(f, "{}", s)
    }
}

/// The three named policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyTable {
    pub joined: ReplicationPolicy,
    pub unjoined: ReplicationPolicy,
    pub dropped: ReplicationPolicy,
}

impl PolicyTable {
    pub fn policy_for(&self, class: ChannelClass) -> ReplicationPolicy {
        match class {
            ChannelClass::Joined => self.joined,
            ChannelClass::Unjoined => self.unjoined,
            ChannelClass::Dropped => self.dropped,
        }
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self {
            joined: ReplicationPolicy::joined(),
            unjoined: ReplicationPolicy::unjoined(),
            dropped: ReplicationPolicy::dropped(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policies() {
        let table = PolicyTable::default();
        assert_eq!(table.joined.limit, 0);
        assert_eq!(table.joined.window_size, Duration::from_secs(140 * 24 * 60 * 60));
        assert_eq!(table.unjoined.limit, 1000);
        assert_eq!(table.unjoined.window_size, table.joined.window_size);
        assert_eq!(table.dropped, ReplicationPolicy::new(0, Duration::ZERO));
    }

    #[test]
    fn test_policy_selection() {
        let table = PolicyTable::default();
        assert_eq!(table.policy_for(ChannelClass::Joined), table.joined);
        assert_eq!(table.policy_for(ChannelClass::Unjoined), table.unjoined);
        assert!(!table.policy_for(ChannelClass::Dropped).replicates());
        assert!(table.policy_for(ChannelClass::Joined).replicates());
    }

    #[test]
    fn test_since_clamps_at_epoch() {
        let policy = ReplicationPolicy::joined();
        assert_eq!(policy.since(Timestamp(1_000)), Timestamp(0));

        let now = Timestamp(DEFAULT_HISTORY_WINDOW.as_millis() as u64 + 5);
        assert_eq!(policy.since(now), Timestamp(5));
    }
}
