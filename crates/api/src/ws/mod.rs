//! WebSocket infrastructure for real-time collaboration.
//!
//! Connection and room management, presence tracking, the authenticated
//! upgrade handler, heartbeat pings and the relay that forwards domain
//! events from the bus into project rooms.

mod handler;
mod heartbeat;
pub mod manager;
pub mod presence;
mod relay;

pub use handler::ws_handler;
pub use heartbeat::run_heartbeat;
pub use manager::WsManager;
pub use presence::PresenceTracker;
pub use relay::run_event_relay;
