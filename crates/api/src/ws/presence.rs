//! In-memory presence: which users are in which project, and their status.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use storyforge_core::collaboration::{presence_status, CollabMessage, PresenceUser};
use storyforge_core::types::{DbId, Timestamp};
use tokio::sync::RwLock;

use crate::ws::manager::{collab_frame, WsManager};

#[derive(Debug, Clone)]
struct PresenceEntry {
    status: String,
    last_seen: Timestamp,
}

/// Per-project presence map, keyed `project -> user`.
#[derive(Default)]
pub struct PresenceTracker {
    projects: RwLock<HashMap<DbId, HashMap<DbId, PresenceEntry>>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `user_id` online in the project, keeping an existing status.
    pub async fn join(&self, project_id: DbId, user_id: DbId) {
        let mut projects = self.projects.write().await;
        let entry = projects
            .entry(project_id)
            .or_default()
            .entry(user_id)
            .or_insert_with(|| PresenceEntry {
                status: presence_status::ONLINE.to_string(),
                last_seen: Utc::now(),
            });
        entry.last_seen = Utc::now();
    }

    /// Set the user's status. Returns `false` if the user is not present.
    pub async fn set_status(&self, project_id: DbId, user_id: DbId, status: &str) -> bool {
        let mut projects = self.projects.write().await;
        match projects
            .get_mut(&project_id)
            .and_then(|users| users.get_mut(&user_id))
        {
            Some(entry) => {
                entry.status = status.to_string();
                entry.last_seen = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Refresh `last_seen` without changing the status.
    pub async fn touch(&self, project_id: DbId, user_id: DbId) {
        let mut projects = self.projects.write().await;
        if let Some(entry) = projects
            .get_mut(&project_id)
            .and_then(|users| users.get_mut(&user_id))
        {
            entry.last_seen = Utc::now();
        }
    }

    /// Remove the user from the project. Returns `true` if they were present.
    pub async fn leave(&self, project_id: DbId, user_id: DbId) -> bool {
        let mut projects = self.projects.write().await;
        let Some(users) = projects.get_mut(&project_id) else {
            return false;
        };
        let removed = users.remove(&user_id).is_some();
        if users.is_empty() {
            projects.remove(&project_id);
        }
        removed
    }

    /// Users present in the project, ordered by user id.
    pub async fn users(&self, project_id: DbId) -> Vec<PresenceUser> {
        let projects = self.projects.read().await;
        let mut users: Vec<PresenceUser> = projects
            .get(&project_id)
            .map(|users| {
                users
                    .iter()
                    .map(|(user_id, entry)| PresenceUser {
                        user_id: *user_id,
                        status: entry.status.clone(),
                        last_seen_at: entry.last_seen.to_rfc3339(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        users.sort_by_key(|u| u.user_id);
        users
    }

    /// Send the project's current presence list to everyone in its room.
    pub async fn broadcast(&self, ws_manager: &WsManager, project_id: DbId) -> usize {
        let users = self.users(project_id).await;
        let message = CollabMessage::PresenceUpdate { project_id, users };
        ws_manager
            .broadcast_to_project(project_id, collab_frame(&message), None)
            .await
    }

    /// Drop entries not seen for `timeout_secs`. Returns the projects that
    /// changed so their rooms can be told.
    pub async fn sweep(&self, timeout_secs: i64) -> Vec<DbId> {
        let cutoff = Utc::now() - Duration::seconds(timeout_secs);
        let mut changed = Vec::new();
        let mut projects = self.projects.write().await;

        projects.retain(|project_id, users| {
            let before = users.len();
            users.retain(|_, entry| entry.last_seen >= cutoff);
            if users.len() != before {
                changed.push(*project_id);
            }
            !users.is_empty()
        });

        changed.sort_unstable();
        changed
    }
}
