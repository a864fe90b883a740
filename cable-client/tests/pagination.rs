/*
    Pagination Tests

    Reads pages through CableClient::get_page and checks:
    - Limits keep the most recent entries
    - Day markers are created once per day across overlapping windows
    - Status messages merge into the page by timestamp
    - Causal order survives timestamp ties
    - Store failures degrade to empty or partially ordered pages
*/

use std::collections::HashMap;
use std::sync::Arc;

use cable_client::config::Config;
use cable_client::core_channel::{PageOptions, RenderableMessage, VirtualKind};
use cable_client::core_post::{Timestamp, DAY_MS};
use cable_client::test_utils::{text_chain, MockStore, PostBuilder};
use cable_client::CableClient;
use futures::future::join_all;

const DAY: u64 = 19_000 * DAY_MS;

async fn client_with_channels(channels: &[&str]) -> (Arc<MockStore>, CableClient) {
    let store = Arc::new(MockStore::new());
    store.set_joined(channels);
    let client = CableClient::new(store.clone(), Config::default());
    client.start().await;
    (store, client)
}

fn day_markers(page: &[RenderableMessage]) -> Vec<Timestamp> {
    page.iter()
        .filter_map(RenderableMessage::as_virtual)
        .filter(|m| m.kind == VirtualKind::StatusDateChanged)
        .map(|m| m.timestamp)
        .collect()
}

fn texts(page: &[RenderableMessage]) -> Vec<String> {
    page.iter().filter_map(|m| m.as_post()).map(|p| p.text.clone()).collect()
}

#[tokio::test]
async fn test_limit_keeps_most_recent_entries() {
    let (store, client) = client_with_channels(&["default"]).await;
    let timestamps: Vec<u64> = (1..=9).map(|i| DAY + i * 1000).collect();
    store.add_posts(text_chain("default", &timestamps));

    // Nine posts plus one day marker
    let full = client.get_page("default", PageOptions::new()).await;
    assert_eq!(full.len(), 10);
    assert!(full[0].is_virtual());

    let page = client.get_page("default", PageOptions::new().limit(3)).await;
    assert_eq!(texts(&page), vec!["message 6", "message 7", "message 8"]);
    assert!(page.iter().all(|m| !m.is_virtual()));

    client.shutdown().await;
}

#[tokio::test]
async fn test_day_markers_created_once_per_day() {
    let (store, client) = client_with_channels(&["default"]).await;
    let timestamps = [DAY + 1000, DAY + 2000, DAY + DAY_MS + 1000, DAY + DAY_MS + 2000];
    store.add_posts(text_chain("default", &timestamps));

    let recent = client
        .get_page("default", PageOptions::new().newer_than(Timestamp(DAY + 1500)))
        .await;
    assert_eq!(day_markers(&recent), vec![Timestamp(DAY + DAY_MS)]);

    for _ in 0..2 {
        let full = client.get_page("default", PageOptions::new()).await;
        assert_eq!(day_markers(&full), vec![Timestamp(DAY), Timestamp(DAY + DAY_MS)]);
        assert_eq!(full.len(), 6);
    }

    client.shutdown().await;
}

#[tokio::test]
async fn test_status_messages_merge_by_timestamp() {
    let (store, client) = client_with_channels(&["default"]).await;
    store.add_posts(text_chain("default", &[DAY + 1000, DAY + 2000]));

    assert!(client.add_status_message("connected", None).await);
    let page = client.get_page("default", PageOptions::new()).await;
    assert_eq!(page.len(), 4);
    assert_eq!(page.last().map(|m| m.text()), Some("connected"));

    assert!(client.clear_status_messages("default").await);
    let page = client.get_page("default", PageOptions::new()).await;
    assert_eq!(page.len(), 3);
    assert_eq!(day_markers(&page), vec![Timestamp(DAY)]);

    assert!(!client.add_status_message("nowhere", Some("unknown")).await);

    client.shutdown().await;
}

#[tokio::test]
async fn test_timestamp_ties_keep_causal_order() {
    let (store, client) = client_with_channels(&["default"]).await;
    let root = PostBuilder::text("default", "root").timestamp(DAY + 500).build();
    let reply = PostBuilder::text("default", "reply").timestamp(DAY + 500).link(&root).build();
    let second = PostBuilder::text("default", "second reply")
        .timestamp(DAY + 500)
        .link(&reply)
        .build();
    store.add_posts([second, reply, root]);

    let page = client.get_page("default", PageOptions::new()).await;
    assert_eq!(texts(&page), vec!["root", "reply", "second reply"]);

    // Same order when the reverse index is unavailable
    store.fail_reverse_links(true);
    let page = client.get_page("default", PageOptions::new()).await;
    assert_eq!(texts(&page), vec!["root", "reply", "second reply"]);

    client.shutdown().await;
}

#[tokio::test]
async fn test_deleted_posts_are_skipped() {
    let (store, client) = client_with_channels(&["default"]).await;
    let posts = text_chain("default", &[DAY + 1000, DAY + 2000, DAY + 3000]);
    store.add_posts(posts.clone());
    store.delete_post(posts[1].post_hash);

    let page = client.get_page("default", PageOptions::new()).await;
    assert_eq!(texts(&page), vec!["message 0", "message 2"]);

    client.shutdown().await;
}

#[tokio::test]
async fn test_unavailable_pages_are_empty() {
    let (store, client) = client_with_channels(&["default"]).await;
    store.add_posts(text_chain("default", &[DAY + 1000]));

    assert!(client.get_page("nowhere", PageOptions::new()).await.is_empty());

    store.fail_fetch(true);
    assert!(client.get_page("default", PageOptions::new()).await.is_empty());

    client.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_pages_across_channels() {
    let channels = ["alpha", "beta", "gamma"];
    let (store, client) = client_with_channels(&channels).await;
    for (i, channel) in channels.iter().enumerate() {
        let count = (i + 1) as u64;
        let timestamps: Vec<u64> = (1..=count).map(|n| DAY + n * 1000).collect();
        store.add_posts(text_chain(channel, &timestamps));
    }

    let pages = join_all(
        channels
            .iter()
            .map(|channel| client.get_page(channel, PageOptions::new())),
    )
    .await;

    let sizes: HashMap<&str, usize> = channels
        .iter()
        .zip(&pages)
        .map(|(channel, page)| (*channel, texts(page).len()))
        .collect();
    assert_eq!(sizes["alpha"], 1);
    assert_eq!(sizes["beta"], 2);
    assert_eq!(sizes["gamma"], 3);

    client.shutdown().await;
}
