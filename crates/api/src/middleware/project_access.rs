//! Project membership checks.
//!
//! Every project-scoped handler calls [`require_project`] before touching
//! project data. Callers who are neither the owner nor an active collaborator
//! get a 404 so project ids do not leak; members lacking the needed
//! permission get a 403.

use storyforge_core::collaboration::{
    collaborator_allows, collaborator_status, CollaboratorRole, Permission,
};
use storyforge_core::error::CoreError;
use storyforge_core::types::DbId;
use storyforge_db::repositories::{CollaboratorRepo, ProjectRepo};
use storyforge_db::DbPool;

use super::auth::AuthUser;
use crate::error::AppResult;

/// A caller's resolved standing on a project.
#[derive(Debug, Clone)]
pub struct ProjectMember {
    pub project_id: DbId,
    pub owner_id: DbId,
    pub role: CollaboratorRole,
    pub permissions: serde_json::Value,
}

impl ProjectMember {
    pub fn is_owner(&self) -> bool {
        self.role == CollaboratorRole::Owner
    }

    pub fn can(&self, permission: Permission) -> bool {
        collaborator_allows(self.role, &self.permissions, permission)
    }
}

/// Resolve `user`'s role on `project_id` and require `permission`.
///
/// Admins act as owners. Active collaborators have their `last_access`
/// refreshed.
pub async fn require_project(
    pool: &DbPool,
    project_id: DbId,
    user: &AuthUser,
    permission: Permission,
) -> AppResult<ProjectMember> {
    let member = resolve_member(pool, project_id, user).await?;

    if !member.can(permission) {
        return Err(CoreError::Forbidden(format!(
            "Your role '{}' does not allow this action",
            member.role.as_str()
        ))
        .into());
    }
    Ok(member)
}

async fn resolve_member(
    pool: &DbPool,
    project_id: DbId,
    user: &AuthUser,
) -> AppResult<ProjectMember> {
    let not_found = || CoreError::NotFound {
        entity: "Project",
        id: project_id,
    };

    let access = ProjectRepo::access(pool, project_id, user.user_id)
        .await?
        .ok_or_else(not_found)?;

    if access.owner_id == user.user_id || user.is_admin() {
        return Ok(ProjectMember {
            project_id,
            owner_id: access.owner_id,
            role: CollaboratorRole::Owner,
            permissions: serde_json::json!({}),
        });
    }

    let active = access.status.as_deref() == Some(collaborator_status::ACTIVE);
    let role = access
        .role
        .as_deref()
        .and_then(CollaboratorRole::parse)
        .filter(|_| active)
        .ok_or_else(not_found)?;

    if let Err(e) = CollaboratorRepo::touch(pool, project_id, user.user_id).await {
        tracing::warn!(error = %e, project_id, user_id = user.user_id, "Failed to touch collaborator");
    }

    Ok(ProjectMember {
        project_id,
        owner_id: access.owner_id,
        role,
        permissions: access.permissions.unwrap_or_else(|| serde_json::json!({})),
    })
}
