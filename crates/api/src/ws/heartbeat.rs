use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::ws::manager::WsManager;

/// Interval between heartbeat pings (in seconds).
const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Ping every connected client on a fixed interval until `cancel` fires.
///
/// Clients answer with Pong frames, which the connection loop uses to keep
/// their presence fresh in every room they have joined.
pub async fn run_heartbeat(ws_manager: Arc<WsManager>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                let count = ws_manager.connection_count().await;
                if count > 0 {
                    tracing::trace!(count, "WebSocket heartbeat ping");
                    ws_manager.ping_all().await;
                }
            }
        }
    }
}
