/*
    Client Bootstrap Tests

    Drives CableClient::start over the in-memory store and checks:
    - Default channel join and focus selection
    - Replication policy per channel class
    - Readiness callbacks and the Ready event
    - Topic, member and role loading for joined channels
    - Failed channel-list lookups do not block readiness
*/

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cable_client::config::Config;
use cable_client::core_store::{Role, RoleMap};
use cable_client::test_utils::{
    recv_matching, test_key, MockStore, Published, RecordedRequest, DEFAULT_TEST_TIMEOUT,
};
use cable_client::{CableClient, ClientEvent};

async fn started_client(store: &Arc<MockStore>) -> CableClient {
    let client = CableClient::new(store.clone(), Config::default());
    client.start().await;
    client
}

fn post_limits(store: &MockStore, channel: &str) -> Vec<usize> {
    store
        .post_requests(channel)
        .into_iter()
        .filter_map(|r| match r {
            RecordedRequest::Posts { limit, .. } => Some(limit),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_fresh_client_joins_and_focuses_default() {
    let store = Arc::new(MockStore::new());
    let client = started_client(&store).await;

    assert!(client.is_ready());
    assert_eq!(client.get_joined_channels().await, vec!["default".to_string()]);
    assert_eq!(client.get_current_channel().await.as_deref(), Some("default"));
    assert!(client.channel_info("default").await.unwrap().focused);
    assert!(store.published().contains(&Published::Join("default".into())));
    assert!(client
        .channel_members(None)
        .await
        .contains_key(&client.local_key()));

    client.shutdown().await;
}

#[tokio::test]
async fn test_focus_falls_back_to_first_joined_channel() {
    let store = Arc::new(MockStore::new());
    store.set_joined(&["zeta", "alpha"]);
    let client = started_client(&store).await;

    assert_eq!(client.get_current_channel().await.as_deref(), Some("alpha"));
    assert_eq!(client.get_joined_channels().await, vec!["alpha".to_string(), "zeta".to_string()]);
    assert!(!store.published().iter().any(|p| matches!(p, Published::Join(_))));

    client.shutdown().await;
}

#[tokio::test]
async fn test_policy_selection_per_channel_class() {
    let store = Arc::new(MockStore::new());
    store.set_joined(&["default"]);
    store.set_known(&["default", "random"]);
    let client = started_client(&store).await;

    let joined = post_limits(&store, "default");
    assert!(!joined.is_empty());
    assert!(joined.iter().all(|limit| *limit == 0));
    assert_eq!(post_limits(&store, "random"), vec![1000]);

    // Leaving drops the channel; rejoining backfills under the joined policy
    assert!(client.join("random", false).await);
    assert!(client.leave("random").await);
    store.clear_requests();
    assert!(client.join("random", false).await);
    assert_eq!(post_limits(&store, "random"), vec![0]);

    client.shutdown().await;
}

#[tokio::test]
async fn test_ready_callbacks_fire_once() {
    let store = Arc::new(MockStore::new());
    let client = CableClient::new(store.clone(), Config::default());
    let count = Arc::new(AtomicUsize::new(0));
    let mut events = client.subscribe();

    let before = count.clone();
    client.on_ready(move || {
        before.fetch_add(1, Ordering::SeqCst);
    });
    assert!(!client.is_ready());

    client.start().await;
    client.start().await;
    assert_eq!(count.load(Ordering::SeqCst), 1);

    let after = count.clone();
    client.on_ready(move || {
        after.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(count.load(Ordering::SeqCst), 2);

    let ready = recv_matching(&mut events, DEFAULT_TEST_TIMEOUT, |e| *e == ClientEvent::Ready).await;
    assert_eq!(ready, Ok(ClientEvent::Ready));
    client.ready().await;

    client.shutdown().await;
}

#[tokio::test]
async fn test_joined_channel_state_is_loaded() {
    let store = Arc::new(MockStore::new());
    store.set_joined(&["default", "dev"]);
    store.set_topic_text("dev", "rust things");
    store.add_user("dev", test_key(2), "bob");

    let mut roles = RoleMap::new();
    roles.insert(test_key(2), HashMap::from([("dev".to_string(), Role::Moderator)]));
    store.set_roles(roles);

    let client = started_client(&store).await;

    assert_eq!(client.topic("dev").await, "rust things");
    let members = client.channel_members(Some("dev")).await;
    let bob = &members[&test_key(2)];
    assert_eq!(bob.display_name(), "bob");
    assert!(bob.is_moderator("dev"));
    assert!(!bob.is_moderator("default"));

    client.shutdown().await;
}

#[tokio::test]
async fn test_channel_list_failure_still_becomes_ready() {
    let store = Arc::new(MockStore::new());
    store.fail_channel_lists(true);
    let client = started_client(&store).await;

    assert!(client.is_ready());
    assert!(client.get_all_channels().await.is_empty());
    assert!(store
        .requests()
        .iter()
        .any(|r| matches!(r, RecordedRequest::Channels { .. })));

    client.shutdown().await;
}

#[tokio::test]
async fn test_client_honours_partial_config_document() {
    let config: Config = serde_json::from_value(serde_json::json!({
        "client": { "default_channel": "lobby" },
        "replication": {
            "ttl": 2,
            "policies": {
                "joined": { "limit": 0, "window_size": "1week" },
                "unjoined": { "limit": 50, "window_size": "1day" },
                "dropped": { "limit": 0, "window_size": "0s" }
            }
        }
    }))
    .unwrap();
    config.validate().unwrap();

    let store = Arc::new(MockStore::new());
    store.set_known(&["lobby", "random"]);
    let client = CableClient::new(store.clone(), config);
    client.start().await;

    assert_eq!(client.get_current_channel().await.as_deref(), Some("lobby"));
    assert_eq!(client.config().client.page_limit, 500);
    assert_eq!(post_limits(&store, "random"), vec![50]);
    assert!(store.requests().iter().all(|r| match r {
        RecordedRequest::Posts { ttl, .. }
        | RecordedRequest::State { ttl, .. }
        | RecordedRequest::Moderation { ttl, .. }
        | RecordedRequest::Channels { ttl, .. } => *ttl == 2,
    }));

    client.shutdown().await;
}

#[tokio::test]
async fn test_joined_list_failure_leaves_other_steps_running() {
    let store = Arc::new(MockStore::new());
    store.set_joined(&["default"]);
    store.set_known(&["default", "random"]);
    store.fail_joined_channels(true);
    let client = started_client(&store).await;

    assert!(client.is_ready());
    let requests = store.requests();
    for channel in ["default", "random"] {
        assert!(requests
            .iter()
            .any(|r| matches!(r, RecordedRequest::State { channel: c, .. } if c == channel)));
    }
    assert!(requests.iter().any(|r| matches!(r, RecordedRequest::Channels { .. })));

    client.shutdown().await;
}

#[tokio::test]
async fn test_known_list_failure_still_backfills_joined_channels() {
    let store = Arc::new(MockStore::new());
    store.set_joined(&["default"]);
    store.set_known(&["default", "random"]);
    store.fail_known_channels(true);
    let client = started_client(&store).await;

    assert!(client.is_ready());
    assert_eq!(client.get_joined_channels().await, vec!["default".to_string()]);
    assert_eq!(post_limits(&store, "default"), vec![0]);
    assert!(post_limits(&store, "random").is_empty());

    client.shutdown().await;
}
