//! Integration tests for the activity persistence task.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use storyforge_db::repositories::ActivityEventRepo;
use storyforge_events::{EventBus, EventPersistence, StoryEvent};

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_persist_single_event(pool: PgPool) {
    let event = StoryEvent::new("comment.created")
        .in_project(12)
        .with_source("comment", 5)
        .with_payload(serde_json::json!({"content": "Nice"}));

    let id = EventPersistence::persist(&pool, &event).await.unwrap();
    assert!(id > 0);

    let rows = ActivityEventRepo::list_for_project(&pool, 12, 10, 0).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, "comment.created");
    assert_eq!(rows[0].source_entity_id, Some(5));
    assert_eq!(rows[0].payload["content"], "Nice");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_run_drains_bus_until_closed(pool: PgPool) {
    let bus = Arc::new(EventBus::default());
    let handle = tokio::spawn(EventPersistence::run(pool.clone(), bus.subscribe()));

    for i in 0..3 {
        bus.publish(StoryEvent::new("scene.updated").in_project(1).with_source("scene", i));
    }
    bus.publish(StoryEvent::new("tokens.charged"));

    drop(bus);
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("persistence should stop when the bus closes")
        .unwrap();

    let rows = ActivityEventRepo::list_for_project(&pool, 1, 10, 0).await.unwrap();
    assert_eq!(rows.len(), 3);
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM activity_events")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(total, 4);
}
