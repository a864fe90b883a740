//! Metrics for replication requests, page assembly and readiness
//!
//! Recorded through the `metrics` facade; installing a recorder/exporter is
//! left to the embedding application.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Instant;

pub const REQUESTS_POSTS: &str = "cable.requests.posts";
pub const REQUESTS_STATE: &str = "cable.requests.state";
pub const REQUESTS_MODERATION: &str = "cable.requests.moderation";
pub const REQUESTS_CHANNELS: &str = "cable.requests.channels";
pub const REQUESTS_FAILED: &str = "cable.requests.failed";
pub const PAGE_FETCH_FAILED: &str = "cable.page.fetch_failed";
pub const CAUSAL_SORT_ORPHANED: &str = "cable.causal_sort.orphaned";
pub const CAUSAL_SORT_DURATION_MS: &str = "cable.causal_sort.duration_ms";
pub const READINESS_READY: &str = "cable.readiness.ready";

/// Initialize metrics with descriptions
pub fn init_metrics() {
    // Replication requests
    describe_counter!(REQUESTS_POSTS, "Post backfill requests issued");
    describe_counter!(REQUESTS_STATE, "Channel state requests issued");
    describe_counter!(REQUESTS_MODERATION, "Moderation state requests issued");
    describe_counter!(REQUESTS_CHANNELS, "Channel list requests issued");
    describe_counter!(REQUESTS_FAILED, "Replication requests the store rejected");

    // Timeline
    describe_counter!(PAGE_FETCH_FAILED, "Page fetches that fell back to an empty page");
    describe_counter!(CAUSAL_SORT_ORPHANED, "Posts left unordered by a link cycle");
    describe_histogram!(CAUSAL_SORT_DURATION_MS, "Causal sort duration in milliseconds");

    describe_counter!(READINESS_READY, "Readiness barriers that opened");
}

/// Kind of replication request sent to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Posts,
    State,
    Moderation,
    Channels,
}

impl RequestKind {
    pub fn metric_name(&self) -> &'static str {
        match self {
            RequestKind::Posts => REQUESTS_POSTS,
            RequestKind::State => REQUESTS_STATE,
            RequestKind::Moderation => REQUESTS_MODERATION,
            RequestKind::Channels => REQUESTS_CHANNELS,
        }
    }
}

/// Count an issued request, or a failed one
pub fn record_request(kind: RequestKind, ok: bool) {
    if ok {
        counter!(kind.metric_name()).increment(1);
    } else {
        counter!(REQUESTS_FAILED, "kind" => kind.metric_name()).increment(1);
    }
}

/// Record a counter metric
pub fn record_counter(name: &'static str, value: u64) {
    counter!(name).increment(value);
}

/// Record a histogram metric
pub fn record_histogram(name: &'static str, value: f64) {
    histogram!(name).record(value);
}

/// Timer for measuring operation duration
pub struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    /// Stop the timer and record the duration in milliseconds
    pub fn stop(self) -> f64 {
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        histogram!(self.name).record(elapsed_ms);
        elapsed_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_init() {
        init_metrics();
        // No recorder installed; must not panic
        record_request(RequestKind::Posts, true);
        record_request(RequestKind::Channels, false);
    }

    #[test]
    fn test_timer() {
        let timer = Timer::new(CAUSAL_SORT_DURATION_MS);
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(timer.stop() >= 5.0);
    }

    #[test]
    fn test_request_metric_names() {
        assert_eq!(RequestKind::State.metric_name(), "cable.requests.state");
        assert_eq!(RequestKind::Moderation.metric_name(), "cable.requests.moderation");
    }
}
