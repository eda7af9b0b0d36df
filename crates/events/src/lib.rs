//! StoryForge event bus and activity persistence.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`StoryEvent`]: the domain event envelope.
//! - [`EventPersistence`]: background service that writes every event to
//!   the `activity_events` table.

pub mod bus;
pub mod kinds;
pub mod persistence;

pub use bus::{EventBus, StoryEvent};
pub use persistence::EventPersistence;
