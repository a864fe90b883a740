//! Page fetch
//!
//! Pulls a time-windowed batch of posts from the store and puts it in causal
//! order. Merging in virtual messages happens in
//! [`ChannelDetails::render_page`](super::ChannelDetails::render_page), which
//! needs mutable channel state.

use crate::core_post::{causal_sort, Post, ReverseLinks, Timestamp};
use crate::core_store::CableStore;
use crate::metrics::{self, record_counter};
use tracing::{debug, warn};

/// Window and size of a page request
///
/// `None` (or zero) bounds mean unbounded; a missing or zero limit means the
/// configured default page size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageOptions {
    pub newer_than: Option<Timestamp>,
    pub older_than: Option<Timestamp>,
    pub limit: Option<usize>,
}

impl PageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn newer_than(mut self, ts: impl Into<Timestamp>) -> Self {
        self.newer_than = Some(ts.into());
        self
    }

    pub fn older_than(mut self, ts: impl Into<Timestamp>) -> Self {
        self.older_than = Some(ts.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn effective_limit(&self, default_limit: usize) -> usize {
        self.limit.filter(|l| *l > 0).unwrap_or(default_limit)
    }

    /// Lower bound, 0 when unset
    pub fn since(&self) -> Timestamp {
        self.newer_than.unwrap_or_default()
    }

    /// Upper bound as the store expects it: 0 when unbounded
    pub fn until(&self) -> Timestamp {
        self.older_than.unwrap_or_default()
    }

    /// Whether `ts` lies strictly inside the window
    pub fn contains(&self, ts: Timestamp) -> bool {
        let upper = match self.older_than {
            Some(Timestamp(0)) | None => u64::MAX,
            Some(t) => t.0,
        };
        ts > self.since() && ts.0 < upper
    }
}

/// Fetch the posts of a page and order them causally.
///
/// Tombstoned entries are dropped. A fetch failure yields an empty batch; a
/// reverse-link failure falls back to the links the posts declare. Posts left
/// unordered by a link cycle are appended after the ordered ones.
pub async fn fetch_ordered(
    store: &dyn CableStore,
    channel: &str,
    opts: &PageOptions,
    default_limit: usize,
) -> Vec<Post> {
    let limit = opts.effective_limit(default_limit);
    let posts: Vec<Post> = match store.fetch_range(channel, opts.since(), opts.until(), limit).await {
        Ok(posts) => posts.into_iter().flatten().collect(),
        Err(e) => {
            warn!(channel = %channel, error = %e, "Failed to fetch page");
            record_counter(metrics::PAGE_FETCH_FAILED, 1);
            return Vec::new();
        }
    };
    if posts.is_empty() {
        return posts;
    }

    let hashes: Vec<_> = posts.iter().map(|p| p.post_hash).collect();
    let reverse_links = store.reverse_links(&hashes).await.unwrap_or_else(|e| {
        debug!(channel = %channel, error = %e, "Reverse links unavailable, using declared links");
        ReverseLinks::new()
    });

    causal_sort(posts, &reverse_links).into_posts()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{text_chain, MockStore, PostBuilder};

    #[test]
    fn test_options_defaults() {
        let opts = PageOptions::new();
        assert_eq!(opts.effective_limit(500), 500);
        assert_eq!(opts.limit(0).effective_limit(500), 500);
        assert_eq!(opts.limit(3).effective_limit(500), 3);
        assert_eq!(opts.until(), Timestamp(0));
        assert!(opts.contains(Timestamp(1)));
        assert!(!opts.contains(Timestamp(0)));
    }

    #[test]
    fn test_window_is_exclusive() {
        let opts = PageOptions::new().newer_than(10u64).older_than(20u64);
        assert!(!opts.contains(Timestamp(10)));
        assert!(opts.contains(Timestamp(15)));
        assert!(!opts.contains(Timestamp(20)));
    }

    #[tokio::test]
    async fn test_fetch_orders_causally_and_skips_tombstones() {
        let store = MockStore::new();
        let chain = text_chain("default", &[30, 20, 10]);
        store.add_posts(chain.clone());
        let stray = PostBuilder::text("default", "stray").timestamp(25).build();
        store.add_post(stray.clone());
        store.delete_post(stray.post_hash);

        let posts = fetch_ordered(&store, "default", &PageOptions::new(), 500).await;
        let hashes: Vec<_> = posts.iter().map(|p| p.post_hash).collect();
        assert_eq!(hashes, chain.iter().map(|p| p.post_hash).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_fetch_failure_is_empty() {
        let store = MockStore::new();
        store.add_posts(text_chain("default", &[1, 2]));
        store.fail_fetch(true);
        assert!(fetch_ordered(&store, "default", &PageOptions::new(), 500).await.is_empty());
    }

    #[tokio::test]
    async fn test_reverse_link_failure_still_orders() {
        let store = MockStore::new();
        let chain = text_chain("default", &[50, 40]);
        store.add_posts(chain.clone());
        store.fail_reverse_links(true);

        let posts = fetch_ordered(&store, "default", &PageOptions::new(), 500).await;
        assert_eq!(posts[0].post_hash, chain[0].post_hash);
        assert_eq!(posts[1].post_hash, chain[1].post_hash);
    }
}
