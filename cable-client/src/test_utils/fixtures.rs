//! Test fixtures for creating posts and keys
//!
//! Provides builder patterns and factory functions for creating test data.

use crate::core_post::{Post, PostHash, PostType, PublicKey, ReverseLinks, Timestamp};

/// Deterministic public key filled with `id`
pub fn test_key(id: u8) -> PublicKey {
    PublicKey::from_bytes([id; 32])
}

/// Author used by [`PostBuilder`] unless overridden
pub fn default_author() -> PublicKey {
    test_key(7)
}

/// Builder for creating test posts
///
/// The hash is a blake3 digest over the post's fields unless set explicitly,
/// so two builders with identical inputs produce the same post.
pub struct PostBuilder {
    post_type: PostType,
    channel: String,
    text: String,
    timestamp: Timestamp,
    links: Vec<PostHash>,
    author: PublicKey,
    hash: Option<PostHash>,
}

impl PostBuilder {
    pub fn new(post_type: PostType, channel: &str) -> Self {
        Self {
            post_type,
            channel: channel.to_string(),
            text: String::new(),
            timestamp: Timestamp(0),
            links: Vec::new(),
            author: default_author(),
            hash: None,
        }
    }

    /// A post/text in `channel`
    pub fn text(channel: &str, text: &str) -> Self {
        let mut builder = Self::new(PostType::Text, channel);
        builder.text = text.to_string();
        builder
    }

    pub fn timestamp(mut self, millis: u64) -> Self {
        self.timestamp = Timestamp(millis);
        self
    }

    /// Declare `parent` as a causal predecessor
    pub fn link(mut self, parent: &Post) -> Self {
        self.links.push(parent.post_hash);
        self
    }

    pub fn link_hash(mut self, hash: PostHash) -> Self {
        self.links.push(hash);
        self
    }

    pub fn author(mut self, author: PublicKey) -> Self {
        self.author = author;
        self
    }

    /// Override the content hash
    pub fn hash(mut self, hash: PostHash) -> Self {
        self.hash = Some(hash);
        self
    }

    pub fn build(self) -> Post {
        let post_hash = self.hash.unwrap_or_else(|| {
            let mut hasher = blake3::Hasher::new();
            hasher.update(&[self.post_type.code()]);
            hasher.update(self.author.as_bytes());
            hasher.update(&self.timestamp.as_millis().to_le_bytes());
            hasher.update(self.channel.as_bytes());
            hasher.update(&[0]);
            hasher.update(self.text.as_bytes());
            for link in &self.links {
                hasher.update(link.as_bytes());
            }
            PostHash::from_bytes(*hasher.finalize().as_bytes())
        });

        Post {
            post_hash,
            public_key: self.author,
            signature: vec![0; 64],
            timestamp: self.timestamp,
            links: self.links,
            post_type: self.post_type,
            channel: self.channel,
            text: self.text,
        }
    }
}

/// Reverse link index derived from the posts' own links
pub fn reverse_links_for(posts: &[Post]) -> ReverseLinks {
    let mut index = ReverseLinks::new();
    for post in posts {
        for parent in &post.links {
            index.entry(*parent).or_default().push(post.post_hash);
        }
    }
    index
}

/// A linear chain of text posts, each linking to the one before
pub fn text_chain(channel: &str, timestamps: &[u64]) -> Vec<Post> {
    let mut posts: Vec<Post> = Vec::with_capacity(timestamps.len());
    for (i, ts) in timestamps.iter().enumerate() {
        let mut builder = PostBuilder::text(channel, &format!("message {}", i)).timestamp(*ts);
        if let Some(prev) = posts.last() {
            builder = builder.link(prev);
        }
        posts.push(builder.build());
    }
    posts
}
