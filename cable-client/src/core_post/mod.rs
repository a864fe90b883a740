//! Posts and causal ordering
//!
//! - **Post**: immutable, content-addressed entry of the replicated log
//! - **Causal sort**: linearization of a post batch that respects links,
//!   tie-broken by timestamp

pub mod causal_sort;
pub mod types;

pub use causal_sort::{causal_sort, CausalOrder, ReverseLinks};
pub use types::{Post, PostHash, PostType, PublicKey, Timestamp, DAY_MS};
