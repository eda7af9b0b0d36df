use std::sync::Arc;

use storyforge_llm::LlmClient;
use storyforge_payments::PaymentGateway;

use crate::config::ServerConfig;
use crate::ws::{PresenceTracker, WsManager};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: storyforge_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// WebSocket connection manager and project rooms.
    pub ws_manager: Arc<WsManager>,
    /// Who is looking at which project, and in what state.
    pub presence: Arc<PresenceTracker>,
    /// Centralized event bus for publishing domain events.
    pub event_bus: Arc<storyforge_events::EventBus>,
    /// Completion client (Anthropic or simulation).
    pub llm: Arc<LlmClient>,
    /// Payment gateway (Stripe or simulation).
    pub payments: Arc<dyn PaymentGateway>,
}
