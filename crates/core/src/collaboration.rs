//! Collaboration constants, roles, the WebSocket message protocol and
//! engagement scoring.
//!
//! Lives in `core` so the repositories, HTTP handlers and WebSocket layer all
//! agree on role names, permission rules and message shapes.

use serde::{Deserialize, Serialize};

use crate::types::DbId;

// ---------------------------------------------------------------------------
// Presence constants
// ---------------------------------------------------------------------------

/// Presence entries older than this many seconds are considered stale.
pub const PRESENCE_STALE_TIMEOUT_SECS: i64 = 300;

/// How often the presence sweep runs (in seconds).
pub const PRESENCE_SWEEP_INTERVAL_SECS: u64 = 60;

/// Collaborators seen within this many days count as active.
pub const ACTIVE_COLLABORATOR_DAYS: i64 = 7;

pub mod presence_status {
    pub const ONLINE: &str = "online";
    pub const AWAY: &str = "away";
    pub const BUSY: &str = "busy";
    pub const EDITING: &str = "editing";
}

pub const VALID_PRESENCE_STATUSES: &[&str] = &[
    presence_status::ONLINE,
    presence_status::AWAY,
    presence_status::BUSY,
    presence_status::EDITING,
];

// ---------------------------------------------------------------------------
// Roles and permissions
// ---------------------------------------------------------------------------

/// A collaborator's role on a project. The project owner is implicitly `Owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollaboratorRole {
    Viewer,
    Commenter,
    Editor,
    Owner,
}

/// Something a project member may want to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    View,
    Comment,
    /// Create or change scenes, objects and the story, and run AI operations.
    Edit,
    /// Invite, re-role and remove collaborators; delete the project.
    Manage,
}

impl CollaboratorRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Commenter => "commenter",
            Self::Editor => "editor",
            Self::Owner => "owner",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "viewer" => Some(Self::Viewer),
            "commenter" => Some(Self::Commenter),
            "editor" => Some(Self::Editor),
            "owner" => Some(Self::Owner),
            _ => None,
        }
    }

    /// Roles form a ladder; each grants everything below it.
    pub fn allows(self, permission: Permission) -> bool {
        let required = match permission {
            Permission::View => Self::Viewer,
            Permission::Comment => Self::Commenter,
            Permission::Edit => Self::Editor,
            Permission::Manage => Self::Owner,
        };
        self >= required
    }
}

/// Roles that may be granted through an invitation.
pub const INVITABLE_ROLES: &[&str] = &["viewer", "commenter", "editor"];

/// Key in a collaborator's `permissions` JSON that grants scene editing
/// regardless of role.
pub const EDIT_SCENES_PERMISSION: &str = "edit_scenes";

/// Whether `role` plus any explicit `permissions` grant `permission`.
pub fn collaborator_allows(
    role: CollaboratorRole,
    permissions: &serde_json::Value,
    permission: Permission,
) -> bool {
    if role.allows(permission) {
        return true;
    }
    permission == Permission::Edit
        && permissions
            .get(EDIT_SCENES_PERMISSION)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
}

pub mod collaborator_status {
    pub const PENDING: &str = "pending";
    pub const ACTIVE: &str = "active";
    pub const DECLINED: &str = "declined";
    pub const REMOVED: &str = "removed";
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

pub const VALID_COMMENT_TYPES: &[&str] = &["general", "suggestion", "issue", "praise"];

pub const DEFAULT_COMMENT_TYPE: &str = "general";

/// Deepest allowed reply nesting (top-level comments have depth 0).
pub const MAX_THREAD_DEPTH: i32 = 5;

/// Maximum comment body length in characters.
pub const MAX_COMMENT_LENGTH: u64 = 5000;

// ---------------------------------------------------------------------------
// WebSocket message protocol
// ---------------------------------------------------------------------------

/// Messages exchanged over the collaboration WebSocket.
///
/// Internally tagged by `"type"` so the frontend can route on the string.
/// `project.join`, `project.leave` and `presence.status` are sent by clients;
/// `presence.update`, `project.event` and `error` only by the server;
/// `scene.editing` and `typing` are relayed from one client to the room with
/// `user_id` filled in by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum CollabMessage {
    #[serde(rename = "project.join")]
    JoinProject { project_id: DbId },

    #[serde(rename = "project.leave")]
    LeaveProject { project_id: DbId },

    #[serde(rename = "presence.status")]
    PresenceStatus { project_id: DbId, status: String },

    #[serde(rename = "presence.update")]
    PresenceUpdate {
        project_id: DbId,
        users: Vec<PresenceUser>,
    },

    #[serde(rename = "scene.editing")]
    SceneEditing {
        project_id: DbId,
        scene_id: DbId,
        editing: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<DbId>,
    },

    #[serde(rename = "typing")]
    Typing {
        project_id: DbId,
        #[serde(default)]
        scene_id: Option<DbId>,
        is_typing: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<DbId>,
    },

    /// A persisted domain event (comment created, scene updated, ...).
    #[serde(rename = "project.event")]
    ProjectEvent {
        project_id: DbId,
        event_type: String,
        actor_user_id: Option<DbId>,
        payload: serde_json::Value,
    },

    #[serde(rename = "error")]
    Error { message: String },
}

/// A user entry in a presence update broadcast.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresenceUser {
    pub user_id: DbId,
    pub status: String,
    pub last_seen_at: String,
}

// ---------------------------------------------------------------------------
// Engagement
// ---------------------------------------------------------------------------

/// Engagement score on a 0-5 scale: 70% active-collaborator ratio, 30%
/// comment volume (saturating at ten comments). Zero collaborators score 0.
pub fn collaboration_score(total: i64, active: i64, comments: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let activity_ratio = active as f64 / total as f64;
    let comment_engagement = (comments as f64 / 10.0).min(1.0);
    let score = (activity_ratio * 0.7 + comment_engagement * 0.3) * 5.0;
    (score * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

pub fn validate_presence_status(status: &str) -> Result<(), String> {
    if VALID_PRESENCE_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(format!(
            "Invalid presence status '{status}'. Must be one of: {}",
            VALID_PRESENCE_STATUSES.join(", ")
        ))
    }
}

pub fn validate_invitable_role(role: &str) -> Result<CollaboratorRole, String> {
    if INVITABLE_ROLES.contains(&role) {
        CollaboratorRole::parse(role).ok_or_else(|| format!("Unknown role '{role}'"))
    } else {
        Err(format!(
            "Invalid role '{role}'. Must be one of: {}",
            INVITABLE_ROLES.join(", ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ladder() {
        assert!(CollaboratorRole::Viewer.allows(Permission::View));
        assert!(!CollaboratorRole::Viewer.allows(Permission::Comment));
        assert!(CollaboratorRole::Commenter.allows(Permission::Comment));
        assert!(!CollaboratorRole::Commenter.allows(Permission::Edit));
        assert!(CollaboratorRole::Editor.allows(Permission::Edit));
        assert!(!CollaboratorRole::Editor.allows(Permission::Manage));
        assert!(CollaboratorRole::Owner.allows(Permission::Manage));
    }

    #[test]
    fn explicit_edit_permission_overrides_role() {
        let grants = serde_json::json!({"edit_scenes": true});
        assert!(collaborator_allows(CollaboratorRole::Viewer, &grants, Permission::Edit));
        assert!(!collaborator_allows(CollaboratorRole::Viewer, &grants, Permission::Manage));
        let none = serde_json::json!({});
        assert!(!collaborator_allows(CollaboratorRole::Commenter, &none, Permission::Edit));
    }

    #[test]
    fn owner_cannot_be_invited() {
        assert_eq!(validate_invitable_role("editor"), Ok(CollaboratorRole::Editor));
        assert!(validate_invitable_role("owner").is_err());
        assert!(validate_invitable_role("admin").is_err());
    }

    #[test]
    fn presence_statuses() {
        assert!(validate_presence_status("online").is_ok());
        assert!(validate_presence_status("asleep").is_err());
    }

    #[test]
    fn score_examples() {
        assert_eq!(collaboration_score(0, 0, 50), 0.0);
        assert_eq!(collaboration_score(4, 2, 5), 2.5);
        assert_eq!(collaboration_score(3, 3, 30), 5.0);
        assert_eq!(collaboration_score(3, 1, 0), 1.17);
    }

    #[test]
    fn join_message_deserializes() {
        let msg: CollabMessage =
            serde_json::from_str(r#"{"type": "project.join", "project_id": 7}"#).unwrap();
        assert_eq!(msg, CollabMessage::JoinProject { project_id: 7 });
    }

    #[test]
    fn typing_relay_serializes_user() {
        let msg = CollabMessage::Typing {
            project_id: 1,
            scene_id: None,
            is_typing: true,
            user_id: Some(9),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "typing");
        assert_eq!(json["user_id"], 9);
    }
}
