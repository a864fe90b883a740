/*
    types.rs - Post data model

    Defines:
    - Timestamps (milliseconds since epoch) and day buckets
    - Post hashes and public keys
    - Post types
    - The immutable Post record handed out by the store
*/

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds in one UTC day
pub const DAY_MS: u64 = 24 * 60 * 60 * 1000;

static LAST_MONOTONIC: AtomicU64 = AtomicU64::new(0);

/// Unix timestamp in milliseconds
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Create a timestamp representing the current wall-clock time
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Timestamp(millis)
    }

    /// Current time, strictly greater than any previous call in this process
    pub fn monotonic_now() -> Self {
        let now = Self::now().0;
        let mut last = LAST_MONOTONIC.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match LAST_MONOTONIC.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => return Timestamp(next),
                Err(actual) => last = actual,
            }
        }
    }

    /// Create a timestamp from milliseconds since epoch
    pub fn from_millis(millis: u64) -> Self {
        Timestamp(millis)
    }

    /// Get milliseconds since epoch
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Start of the UTC day containing this timestamp
    pub fn day_bucket(&self) -> Timestamp {
        Timestamp(self.0 - self.0 % DAY_MS)
    }

    /// Move back by `window`, clamping at the epoch
    pub fn saturating_sub(&self, window: Duration) -> Timestamp {
        Timestamp(self.0.saturating_sub(window.as_millis() as u64))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Timestamp {
    fn from(millis: u64) -> Self {
        Timestamp(millis)
    }
}

/// Content hash identifying a post
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PostHash(pub [u8; 32]);

impl PostHash {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        PostHash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse a 64 character hex string
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let bytes: [u8; 32] = bytes.try_into().ok()?;
        Some(PostHash(bytes))
    }
}

impl fmt::Display for PostHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PostHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PostHash({})", &hex::encode(self.0)[..12])
    }
}

/// Ed25519 public key of a post author
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        PublicKey(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short hex prefix used when a user has not set a name
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.short())
    }
}

/// Post types defined by the cable protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PostType {
    Text,
    Delete,
    Info,
    Topic,
    Join,
    Leave,
    Role,
    Moderation,
    Block,
    Unblock,
}

impl PostType {
    /// Numeric code used on the wire
    pub fn code(&self) -> u8 {
        match self {
            PostType::Text => 0,
            PostType::Delete => 1,
            PostType::Info => 2,
            PostType::Topic => 3,
            PostType::Join => 4,
            PostType::Leave => 5,
            PostType::Role => 6,
            PostType::Moderation => 7,
            PostType::Block => 8,
            PostType::Unblock => 9,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => PostType::Text,
            1 => PostType::Delete,
            2 => PostType::Info,
            3 => PostType::Topic,
            4 => PostType::Join,
            5 => PostType::Leave,
            6 => PostType::Role,
            7 => PostType::Moderation,
            8 => PostType::Block,
            9 => PostType::Unblock,
            _ => return None,
        })
    }
}

/// An immutable, signed entry of the replicated log.
///
/// Owned by the store; this crate only reads posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub post_hash: PostHash,
    pub public_key: PublicKey,
    pub signature: Vec<u8>,
    pub timestamp: Timestamp,
    /// Hashes of causal predecessors
    pub links: Vec<PostHash>,
    pub post_type: PostType,
    pub channel: String,
    pub text: String,
}

impl Post {
    /// Whether this post declares `hash` as a causal parent
    pub fn links_to(&self, hash: &PostHash) -> bool {
        self.links.contains(hash)
    }
}
