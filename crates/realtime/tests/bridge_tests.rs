//! Live bridge behavior against the in-process channel transport

use serde_json::{Value, json};
use skillverse_realtime::{
    BridgeConfig, CacheInvalidator, CacheKey, ChannelServer, ChannelTransport, ConnectionState,
    MAX_NOTIFICATIONS, NewNotification, NotificationCenter, NotificationKind, RealtimeBridge,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const USER: &str = "user_1";

#[derive(Default)]
struct RecordingCache {
    scopes: Mutex<Vec<CacheKey>>,
}

impl RecordingCache {
    fn scopes(&self) -> Vec<CacheKey> {
        self.scopes.lock().unwrap().clone()
    }

    fn count(&self, scope: &CacheKey) -> usize {
        self.scopes().iter().filter(|s| *s == scope).count()
    }
}

impl CacheInvalidator for RecordingCache {
    fn invalidate(&self, scope: &CacheKey) {
        self.scopes.lock().unwrap().push(scope.clone());
    }
}

struct Harness {
    bridge: RealtimeBridge,
    server: ChannelServer,
    cache: Arc<RecordingCache>,
    notifications: Arc<NotificationCenter>,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(BridgeConfig {
            reconnect_attempts: 3,
            reconnect_delay: Duration::from_millis(10),
        })
    }

    fn with_config(config: BridgeConfig) -> Self {
        let (transport, server) = ChannelTransport::new();
        let cache = Arc::new(RecordingCache::default());
        let notifications = Arc::new(NotificationCenter::new());
        let bridge = RealtimeBridge::builder(Arc::new(transport))
            .cache(cache.clone())
            .notifications(notifications.clone())
            .config(config)
            .build();
        Self {
            bridge,
            server,
            cache,
            notifications,
        }
    }

    async fn connect(&self) {
        let mut connection = self.bridge.connect(Some(USER)).expect("user present");
        assert!(connection.wait_connected().await);
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn skill_payload(name: &str) -> Value {
    json!({
        "userId": USER,
        "skill": {
            "id": "skill_1",
            "name": name,
            "level": 75,
            "category": "Programming",
            "proficiency": "advanced",
            "lastUpdated": "2026-10-01T00:00:00Z"
        }
    })
}

#[tokio::test]
async fn skill_updated_marks_graph_stale_and_notifies() {
    let h = Harness::new();
    h.connect().await;
    assert_eq!(h.server.connected_user().as_deref(), Some(USER));

    h.notifications.append(NewNotification::info("Older", "already here"));
    assert!(h.server.push("skill_updated", skill_payload("Python")));

    wait_until(|| h.notifications.len() == 2).await;
    assert_eq!(h.cache.count(&CacheKey::skill_graph(USER)), 1);

    let head = &h.notifications.list()[0];
    assert_eq!(head.kind, NotificationKind::Success);
    assert_eq!(head.title, "Skill Updated");
    assert_eq!(head.message, "Python has been updated");
    assert_eq!(head.action_url.as_deref(), Some("/skills"));
    assert!(!head.read);
}

#[tokio::test]
async fn quiz_completed_twice_is_silent() {
    let h = Harness::new();
    h.connect().await;

    h.server.push("quiz_completed", json!({ "userId": USER }));
    h.server.push("quiz_completed", json!({ "userId": USER }));

    wait_until(|| h.cache.count(&CacheKey::dashboard(USER)) == 2).await;
    assert!(h.notifications.is_empty());
}

#[tokio::test]
async fn events_are_handled_in_arrival_order() {
    let h = Harness::new();
    h.connect().await;

    h.server.push("learning_progress", json!({}));
    h.server.push("not_an_event", json!({}));
    h.server.push_raw("{ not json");
    h.server.push("quiz_completed", json!({}));

    wait_until(|| h.cache.scopes().len() == 2).await;
    assert_eq!(
        h.cache.scopes(),
        vec![CacheKey::learning_path(USER), CacheKey::dashboard(USER)]
    );
}

#[tokio::test]
async fn notification_list_stays_bounded() {
    let h = Harness::new();
    h.connect().await;

    for i in 0..=MAX_NOTIFICATIONS {
        h.server.push("skill_updated", skill_payload(&format!("Skill {i}")));
    }

    wait_until(|| h.cache.count(&CacheKey::skill_graph(USER)) == MAX_NOTIFICATIONS + 1).await;
    let list = h.notifications.list();
    assert_eq!(list.len(), MAX_NOTIFICATIONS);
    assert_eq!(list[0].message, format!("Skill {MAX_NOTIFICATIONS} has been updated"));
    assert_eq!(list.last().unwrap().message, "Skill 1 has been updated");
}

#[tokio::test]
async fn no_user_means_no_connection() {
    let h = Harness::new();
    assert!(h.bridge.connect(None).is_none());
    assert!(h.bridge.connect(Some("")).is_none());

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.server.connect_count(), 0);
    assert_eq!(h.bridge.state(), ConnectionState::Idle);
}

#[tokio::test]
async fn emit_only_while_connected() {
    let h = Harness::new();
    assert!(!h.bridge.emit("quiz_started", json!({ "skillId": "rust" })));

    h.connect().await;
    assert!(h.bridge.emit("quiz_started", json!({ "skillId": "rust" })));
    wait_until(|| h.server.sent().len() == 1).await;
    let sent: Value = serde_json::from_str(&h.server.sent()[0]).unwrap();
    assert_eq!(sent, json!({ "event": "quiz_started", "data": { "skillId": "rust" } }));

    h.bridge.disconnect();
    assert!(!h.bridge.emit("quiz_started", json!({})));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.server.sent().len(), 1);
}

#[tokio::test]
async fn disconnect_is_idempotent_and_stops_delivery() {
    let h = Harness::new();
    h.connect().await;

    h.bridge.disconnect();
    h.bridge.disconnect();
    assert_eq!(h.bridge.state(), ConnectionState::Disconnected);
    assert!(h.bridge.current_user().is_none());

    wait_until(|| !h.server.is_open()).await;
    assert!(!h.server.push("skill_updated", skill_payload("Go")));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(h.notifications.is_empty());
    assert_eq!(h.server.connect_count(), 1);
}

#[tokio::test]
async fn reconnects_and_catches_up_after_drop() {
    let h = Harness::new();
    h.connect().await;
    assert!(h.cache.scopes().is_empty());

    h.server.drop_connections();

    wait_until(|| h.server.connect_count() == 2 && h.bridge.is_connected()).await;
    wait_until(|| h.cache.scopes().len() == 5).await;
    for scope in CacheKey::user_scopes(USER) {
        assert_eq!(h.cache.count(&scope), 1, "{scope} not invalidated");
    }
    assert_eq!(h.cache.count(&CacheKey::trends()), 1);

    assert!(h.server.push("learning_progress", json!({})));
    wait_until(|| h.cache.count(&CacheKey::learning_path(USER)) == 2).await;
}

#[tokio::test]
async fn gives_up_after_configured_attempts() {
    let h = Harness::with_config(BridgeConfig {
        reconnect_attempts: 2,
        reconnect_delay: Duration::from_millis(5),
    });
    h.server.refuse_connections(true);

    let mut connection = h.bridge.connect(Some(USER)).unwrap();
    assert!(!connection.wait_connected().await);
    assert!(matches!(connection.state(), ConnectionState::Failed(_)));
    // initial attempt plus two reconnects
    assert_eq!(h.server.connect_count(), 3);
}

#[tokio::test]
async fn switching_users_replaces_the_session() {
    let h = Harness::new();
    h.connect().await;

    // Same user keeps the running session
    let again = h.bridge.connect(Some(USER)).unwrap();
    assert_eq!(again.user_id(), USER);
    assert_eq!(h.server.connect_count(), 1);

    let mut other = h.bridge.connect(Some("user_2")).unwrap();
    assert!(other.wait_connected().await);
    assert_eq!(h.server.connected_user().as_deref(), Some("user_2"));
    assert_eq!(h.bridge.current_user().as_deref(), Some("user_2"));

    h.server.push("quiz_completed", json!({}));
    wait_until(|| h.cache.count(&CacheKey::dashboard("user_2")) == 1).await;
    assert_eq!(h.cache.count(&CacheKey::dashboard(USER)), 0);
}
