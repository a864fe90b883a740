//! Causal Sort - linearizes a batch of linked posts for display
//!
//! Kahn-style topological order over the links that point *inside* the batch.
//! Every post carries a count of unresolved in-batch parents; a post becomes
//! ready when that count reaches zero, and the ready post with the lowest
//! `(timestamp, hash)` is emitted next using a min-heap.
//! Complexity: O((N + E) log N) for N posts and E in-batch links.
//!
//! Links that point outside the batch never block emission. Posts that can
//! never become ready (link cycles) are returned separately as orphans.

use super::types::{Post, PostHash, Timestamp};
use crate::metrics::{self, Timer};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use tracing::{trace, warn};

/// Reverse-link index: post hash -> hashes of posts that link to it
pub type ReverseLinks = HashMap<PostHash, Vec<PostHash>>;

/// Output of [`causal_sort`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CausalOrder {
    /// Linearization respecting every in-batch link
    pub sorted: Vec<Post>,
    /// Posts whose in-batch parents never resolved, ordered by timestamp
    pub orphaned: Vec<Post>,
}

impl CausalOrder {
    /// Total number of posts, sorted and orphaned
    pub fn len(&self) -> usize {
        self.sorted.len() + self.orphaned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty() && self.orphaned.is_empty()
    }

    /// All posts, orphans appended after the sorted run
    pub fn into_posts(self) -> Vec<Post> {
        let mut posts = self.sorted;
        posts.extend(self.orphaned);
        posts
    }
}

/// Order `posts` so every in-batch causal predecessor precedes its dependents.
///
/// `reverse_links` is the store's index of who links to whom. Edges it lacks
/// are recovered from the posts' own `links`, and edges it reports that a post
/// does not declare are ignored, so a stale or empty index never strands a post.
/// Duplicate hashes in the input are collapsed to their first occurrence.
pub fn causal_sort(posts: Vec<Post>, reverse_links: &ReverseLinks) -> CausalOrder {
    let timer = Timer::new(metrics::CAUSAL_SORT_DURATION_MS);
    let mut batch: HashMap<PostHash, Post> = HashMap::with_capacity(posts.len());
    for post in posts {
        batch.entry(post.post_hash).or_insert(post);
    }

    // Unresolved in-batch parent count per post
    let mut unresolved: HashMap<PostHash, usize> = HashMap::with_capacity(batch.len());
    for (hash, post) in &batch {
        let parents: HashSet<&PostHash> =
            post.links.iter().filter(|link| batch.contains_key(*link)).collect();
        unresolved.insert(*hash, parents.len());
    }

    let children = child_index(&batch, reverse_links);

    let mut ready: BinaryHeap<Reverse<(Timestamp, PostHash)>> = unresolved
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(hash, _)| Reverse((batch[hash].timestamp, *hash)))
        .collect();

    let mut sorted = Vec::with_capacity(batch.len());
    while let Some(Reverse((_, hash))) = ready.pop() {
        let Some(post) = batch.remove(&hash) else {
            continue;
        };
        unresolved.remove(&hash);

        for child in children.get(&hash).into_iter().flatten() {
            if let Some(count) = unresolved.get_mut(child) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    ready.push(Reverse((batch[child].timestamp, *child)));
                }
            }
        }
        sorted.push(post);
    }

    let mut orphaned: Vec<Post> = batch.into_values().collect();
    if !orphaned.is_empty() {
        orphaned.sort_by_key(|p| (p.timestamp, p.post_hash));
        warn!(
            orphaned = orphaned.len(),
            sorted = sorted.len(),
            "Causal sort left posts with unresolvable parents"
        );
        metrics::record_counter(metrics::CAUSAL_SORT_ORPHANED, orphaned.len() as u64);
    }
    timer.stop();

    CausalOrder { sorted, orphaned }
}

/// Build parent -> children edges restricted to the batch, one edge per pair
fn child_index(
    batch: &HashMap<PostHash, Post>,
    reverse_links: &ReverseLinks,
) -> HashMap<PostHash, Vec<PostHash>> {
    let mut children: HashMap<PostHash, Vec<PostHash>> = HashMap::new();
    let mut seen: HashSet<(PostHash, PostHash)> = HashSet::new();

    for (parent, linkers) in reverse_links {
        if !batch.contains_key(parent) {
            continue;
        }
        for child in linkers {
            let declared = batch.get(child).is_some_and(|p| p.links_to(parent));
            if declared && seen.insert((*parent, *child)) {
                children.entry(*parent).or_default().push(*child);
            }
        }
    }

    for (hash, post) in batch {
        for link in &post.links {
            if batch.contains_key(link) && seen.insert((*link, *hash)) {
                trace!(parent = %link, child = %hash, "Reverse link missing from index");
                children.entry(*link).or_default().push(*hash);
            }
        }
    }

    children
}
