use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use storyforge_core::collaboration::{validate_presence_status, CollabMessage, Permission};
use storyforge_core::error::CoreError;
use storyforge_core::types::DbId;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::project_access::require_project;
use crate::state::AppState;
use crate::ws::manager::collab_frame;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// GET /api/v1/ws?token=<access token>
///
/// Browsers cannot set headers on a WebSocket handshake, so the access token
/// travels in the query string. It is checked before the upgrade.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
) -> AppResult<Response> {
    let token = params.token.ok_or_else(|| {
        AppError::Core(CoreError::Unauthorized("Missing token".into()))
    })?;
    let user = AuthUser::from_token(&token, &state.config.jwt)?;

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, state, user))
        .into_response())
}

/// Manage a single WebSocket connection after upgrade.
///
/// Registers the connection, spawns a sender task that drains the manager
/// channel into the sink, dispatches inbound frames on the current task and
/// cleans up rooms and presence on disconnect.
async fn handle_socket(socket: WebSocket, state: AppState, user: AuthUser) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, user_id = user.user_id, "WebSocket connected");

    let mut rx = state.ws_manager.add(conn_id.clone(), user.user_id).await;
    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
                // A live connection keeps its presence fresh.
                for project_id in state.ws_manager.rooms_of(&conn_id).await {
                    state.presence.touch(project_id, user.user_id).await;
                }
            }
            Ok(Message::Text(text)) => {
                match serde_json::from_str::<CollabMessage>(text.as_str()) {
                    Ok(message) => dispatch(&state, &conn_id, &user, message).await,
                    Err(e) => {
                        reply_error(&state, &conn_id, format!("Invalid message: {e}")).await;
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    let rooms = state.ws_manager.remove(&conn_id).await;
    for project_id in rooms {
        leave_project(&state, project_id, user.user_id).await;
    }
    send_task.abort();
    tracing::info!(conn_id = %conn_id, user_id = user.user_id, "WebSocket disconnected");
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

async fn dispatch(state: &AppState, conn_id: &str, user: &AuthUser, message: CollabMessage) {
    match message {
        CollabMessage::JoinProject { project_id } => {
            if let Err(e) = require_project(&state.pool, project_id, user, Permission::View).await {
                tracing::debug!(conn_id, project_id, error = %e, "Join refused");
                reply_error(state, conn_id, format!("Cannot join project {project_id}")).await;
                return;
            }
            state.ws_manager.join_room(conn_id, project_id).await;
            state.presence.join(project_id, user.user_id).await;
            broadcast_presence(state, project_id).await;
        }

        CollabMessage::LeaveProject { project_id } => {
            if state.ws_manager.leave_room(conn_id, project_id).await {
                leave_project(state, project_id, user.user_id).await;
            }
        }

        CollabMessage::PresenceStatus { project_id, status } => {
            if let Err(msg) = validate_presence_status(&status) {
                reply_error(state, conn_id, msg).await;
                return;
            }
            if !ensure_in_room(state, conn_id, project_id).await {
                return;
            }
            state
                .presence
                .set_status(project_id, user.user_id, &status)
                .await;
            broadcast_presence(state, project_id).await;
        }

        CollabMessage::SceneEditing {
            project_id,
            scene_id,
            editing,
            ..
        } => {
            if !ensure_in_room(state, conn_id, project_id).await {
                return;
            }
            state.presence.touch(project_id, user.user_id).await;
            let relayed = CollabMessage::SceneEditing {
                project_id,
                scene_id,
                editing,
                user_id: Some(user.user_id),
            };
            state
                .ws_manager
                .broadcast_to_project(project_id, collab_frame(&relayed), Some(conn_id))
                .await;
        }

        CollabMessage::Typing {
            project_id,
            scene_id,
            is_typing,
            ..
        } => {
            if !ensure_in_room(state, conn_id, project_id).await {
                return;
            }
            state.presence.touch(project_id, user.user_id).await;
            let relayed = CollabMessage::Typing {
                project_id,
                scene_id,
                is_typing,
                user_id: Some(user.user_id),
            };
            state
                .ws_manager
                .broadcast_to_project(project_id, collab_frame(&relayed), Some(conn_id))
                .await;
        }

        CollabMessage::PresenceUpdate { .. }
        | CollabMessage::ProjectEvent { .. }
        | CollabMessage::Error { .. } => {
            reply_error(state, conn_id, "Message type is server-only".to_string()).await;
        }
    }
}

async fn ensure_in_room(state: &AppState, conn_id: &str, project_id: DbId) -> bool {
    if state.ws_manager.in_room(conn_id, project_id).await {
        return true;
    }
    reply_error(state, conn_id, format!("Join project {project_id} first")).await;
    false
}

/// Drop the user's presence once none of their connections remain in the
/// room, and tell the room.
async fn leave_project(state: &AppState, project_id: DbId, user_id: DbId) {
    if state.ws_manager.user_in_room(user_id, project_id).await {
        return;
    }
    if state.presence.leave(project_id, user_id).await {
        broadcast_presence(state, project_id).await;
    }
}

async fn broadcast_presence(state: &AppState, project_id: DbId) {
    state
        .presence
        .broadcast(&state.ws_manager, project_id)
        .await;
}

async fn reply_error(state: &AppState, conn_id: &str, message: String) {
    state
        .ws_manager
        .send_to(conn_id, collab_frame(&CollabMessage::Error { message }))
        .await;
}
