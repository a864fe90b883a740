//! Storage/network collaborator boundary
//!
//! The client never touches persistence or transports directly. It reads posts,
//! issues replication requests and consumes typed events through [`CableStore`].

pub mod errors;
pub mod events;
pub mod traits;

pub use errors::{StoreError, StoreResult};
pub use events::{ModerationKind, Role, RoleMap, StoreEvent};
pub use traits::{CableStore, SharedStore, UserInfo};
