//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the central publish/subscribe hub for [`StoryEvent`]s.
//! It is shared via `Arc<EventBus>` across the application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storyforge_core::types::DbId;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// StoryEvent
// ---------------------------------------------------------------------------

/// Something that happened to a project, a user's balance or a subscription.
///
/// Constructed via [`StoryEvent::new`] and enriched with the builder
/// methods [`in_project`](StoryEvent::in_project),
/// [`with_source`](StoryEvent::with_source),
/// [`with_actor`](StoryEvent::with_actor) and
/// [`with_payload`](StoryEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryEvent {
    /// Dot-separated event name, e.g. `"scene.created"`. See [`crate::kinds`].
    pub kind: String,

    /// Project the event belongs to, if any. Project-scoped events are
    /// relayed to that project's WebSocket room.
    pub project_id: Option<DbId>,

    /// Source entity kind (e.g. `"scene"`, `"comment"`).
    pub entity_type: Option<String>,

    pub entity_id: Option<DbId>,

    /// User that triggered the event.
    pub actor_user_id: Option<DbId>,

    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl StoryEvent {
    /// Create an event with only its kind; all optional fields empty.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            project_id: None,
            entity_type: None,
            entity_id: None,
            actor_user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn in_project(mut self, project_id: DbId) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn with_source(mut self, entity_type: impl Into<String>, entity_id: DbId) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id);
        self
    }

    pub fn with_actor(mut self, user_id: DbId) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`StoryEvent`].
///
/// ```rust
/// use storyforge_events::bus::{EventBus, StoryEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(StoryEvent::new("project.created").in_project(1));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<StoryEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest unconsumed messages are dropped
    /// and slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers. Dropped silently when
    /// nobody is listening.
    pub fn publish(&self, event: StoryEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoryEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
