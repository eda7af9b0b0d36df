//! Unit tests for `WsManager` rooms and `PresenceTracker`.
//!
//! These exercise the connection manager and presence map directly, without
//! performing any HTTP upgrades.

use axum::extract::ws::Message;
use storyforge_api::ws::{PresenceTracker, WsManager};

fn text(message: Message) -> serde_json::Value {
    match message {
        Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Connections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_and_remove_connections() {
    let manager = WsManager::new();
    assert_eq!(manager.connection_count().await, 0);

    let _rx1 = manager.add("conn-1".to_string(), 1).await;
    let _rx2 = manager.add("conn-2".to_string(), 1).await;
    assert_eq!(manager.connection_count().await, 2);

    let mut ids = manager.get_by_user(1).await;
    ids.sort();
    assert_eq!(ids, vec!["conn-1", "conn-2"]);

    manager.remove("nonexistent").await;
    assert_eq!(manager.connection_count().await, 2);

    manager.remove("conn-1").await;
    assert_eq!(manager.connection_count().await, 1);
}

#[tokio::test]
async fn remove_returns_joined_rooms() {
    let manager = WsManager::new();
    let _rx = manager.add("conn-1".to_string(), 1).await;
    manager.join_room("conn-1", 10).await;
    manager.join_room("conn-1", 20).await;

    let mut rooms = manager.remove("conn-1").await;
    rooms.sort_unstable();
    assert_eq!(rooms, vec![10, 20]);
}

// ---------------------------------------------------------------------------
// Rooms
// ---------------------------------------------------------------------------

#[tokio::test]
async fn join_unknown_connection_fails() {
    let manager = WsManager::new();
    assert!(!manager.join_room("ghost", 10).await);
}

#[tokio::test]
async fn room_membership() {
    let manager = WsManager::new();
    let _rx = manager.add("conn-1".to_string(), 1).await;

    assert!(manager.join_room("conn-1", 10).await);
    assert!(manager.in_room("conn-1", 10).await);
    assert!(manager.user_in_room(1, 10).await);
    assert_eq!(manager.rooms_of("conn-1").await, vec![10]);

    assert!(manager.leave_room("conn-1", 10).await);
    assert!(!manager.leave_room("conn-1", 10).await);
    assert!(!manager.user_in_room(1, 10).await);
}

#[tokio::test]
async fn user_stays_in_room_through_another_tab() {
    let manager = WsManager::new();
    let _rx1 = manager.add("tab-1".to_string(), 1).await;
    let _rx2 = manager.add("tab-2".to_string(), 1).await;
    manager.join_room("tab-1", 10).await;
    manager.join_room("tab-2", 10).await;

    manager.remove("tab-1").await;
    assert!(manager.user_in_room(1, 10).await);
}

#[tokio::test]
async fn project_broadcast_reaches_room_only() {
    let manager = WsManager::new();
    let mut rx_a = manager.add("a".to_string(), 1).await;
    let mut rx_b = manager.add("b".to_string(), 2).await;
    let mut rx_c = manager.add("c".to_string(), 3).await;
    manager.join_room("a", 10).await;
    manager.join_room("b", 10).await;
    manager.join_room("c", 20).await;

    let sent = manager
        .broadcast_to_project(10, Message::Text("hello".into()), Some("a"))
        .await;
    assert_eq!(sent, 1);

    assert!(matches!(rx_b.try_recv(), Ok(Message::Text(t)) if t.as_str() == "hello"));
    assert!(rx_a.try_recv().is_err());
    assert!(rx_c.try_recv().is_err());
}

#[tokio::test]
async fn send_to_user_reaches_every_connection() {
    let manager = WsManager::new();
    let mut rx1 = manager.add("tab-1".to_string(), 7).await;
    let mut rx2 = manager.add("tab-2".to_string(), 7).await;
    let mut other = manager.add("tab-3".to_string(), 8).await;

    let sent = manager.send_to_user(7, Message::Text("hi".into())).await;
    assert_eq!(sent, 2);
    assert!(rx1.try_recv().is_ok());
    assert!(rx2.try_recv().is_ok());
    assert!(other.try_recv().is_err());
}

#[tokio::test]
async fn shutdown_sends_close_and_clears() {
    let manager = WsManager::new();
    let mut rx = manager.add("conn-1".to_string(), 1).await;

    manager.shutdown_all().await;

    assert_eq!(manager.connection_count().await, 0);
    assert!(matches!(rx.try_recv(), Ok(Message::Close(None))));
}

#[tokio::test]
async fn ping_all_sends_ping_frames() {
    let manager = WsManager::new();
    let mut rx = manager.add("conn-1".to_string(), 1).await;

    manager.ping_all().await;

    assert!(matches!(rx.try_recv(), Ok(Message::Ping(_))));
}

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn presence_join_status_and_leave() {
    let presence = PresenceTracker::new();
    presence.join(10, 2).await;
    presence.join(10, 1).await;

    let users = presence.users(10).await;
    assert_eq!(users.iter().map(|u| u.user_id).collect::<Vec<_>>(), vec![1, 2]);
    assert!(users.iter().all(|u| u.status == "online"));

    assert!(presence.set_status(10, 1, "editing").await);
    assert!(!presence.set_status(10, 99, "away").await);

    // Re-joining keeps the status.
    presence.join(10, 1).await;
    assert_eq!(presence.users(10).await[0].status, "editing");

    assert!(presence.leave(10, 1).await);
    assert!(!presence.leave(10, 1).await);
    assert_eq!(presence.users(10).await.len(), 1);
    assert!(presence.users(20).await.is_empty());
}

#[tokio::test]
async fn presence_sweep_drops_stale_entries() {
    let presence = PresenceTracker::new();
    presence.join(10, 1).await;
    presence.join(20, 2).await;

    assert!(presence.sweep(300).await.is_empty());

    let changed = presence.sweep(-1).await;
    assert_eq!(changed, vec![10, 20]);
    assert!(presence.users(10).await.is_empty());
}

#[tokio::test]
async fn presence_broadcast_sends_update_to_room() {
    let manager = WsManager::new();
    let presence = PresenceTracker::new();
    let mut rx = manager.add("conn-1".to_string(), 1).await;
    manager.join_room("conn-1", 10).await;
    presence.join(10, 1).await;

    assert_eq!(presence.broadcast(&manager, 10).await, 1);

    let json = text(rx.try_recv().unwrap());
    assert_eq!(json["type"], "presence.update");
    assert_eq!(json["project_id"], 10);
    assert_eq!(json["users"][0]["user_id"], 1);
}
