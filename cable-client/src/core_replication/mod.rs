//! Replication policy and scheduling
//!
//! - **Policy**: `(limit, window_size)` per channel class
//! - **Scheduler**: startup backfill, new-channel bootstrap and periodic
//!   channel-list renewal

pub mod policy;
pub mod scheduler;

pub use policy::{
    ChannelClass, PolicyTable, ReplicationPolicy, DEFAULT_HISTORY_WINDOW, DEFAULT_UNJOINED_LIMIT,
};
pub use scheduler::ReplicationScheduler;
