//! Repository for the `project_collaborators` table.

use sqlx::PgPool;
use storyforge_core::collaboration::{collaborator_status, ACTIVE_COLLABORATOR_DAYS};
use storyforge_core::types::DbId;

use crate::models::collaboration::{
    CollaborationCounts, CollaboratorWithUser, CreateInvitation, ProjectCollaborator,
};

const COLUMNS: &str = "id, project_id, user_id, invited_by, role, permissions, status, \
                        invitation_token, invited_at, joined_at, last_access, updated_at";

const C_COLUMNS: &str = "c.id, c.project_id, c.user_id, c.invited_by, c.role, c.permissions, \
                        c.status, c.invitation_token, c.invited_at, c.joined_at, \
                        c.last_access, c.updated_at";

pub struct CollaboratorRepo;

impl CollaboratorRepo {
    /// Create a pending invitation. A user who previously declined or was
    /// removed is re-invited in place.
    ///
    /// Returns `None` when the user already has a pending or active row.
    pub async fn invite(
        pool: &PgPool,
        input: &CreateInvitation,
    ) -> Result<Option<ProjectCollaborator>, sqlx::Error> {
        let query = format!(
            "INSERT INTO project_collaborators
                (project_id, user_id, invited_by, role, permissions, status, invitation_token)
             VALUES ($1, $2, $3, $4, $5, '{pending}', $6)
             ON CONFLICT ON CONSTRAINT uq_project_collaborators_project_user DO UPDATE SET
                invited_by = EXCLUDED.invited_by,
                role = EXCLUDED.role,
                permissions = EXCLUDED.permissions,
                status = EXCLUDED.status,
                invitation_token = EXCLUDED.invitation_token,
                invited_at = NOW(),
                joined_at = NULL
             WHERE project_collaborators.status IN ('{declined}', '{removed}')
             RETURNING {COLUMNS}",
            pending = collaborator_status::PENDING,
            declined = collaborator_status::DECLINED,
            removed = collaborator_status::REMOVED,
        );
        sqlx::query_as::<_, ProjectCollaborator>(&query)
            .bind(input.project_id)
            .bind(input.user_id)
            .bind(input.invited_by)
            .bind(&input.role)
            .bind(&input.permissions)
            .bind(&input.invitation_token)
            .fetch_optional(pool)
            .await
    }

    /// Answer a pending invitation addressed to `user_id`. The token is
    /// consumed either way.
    pub async fn respond(
        pool: &PgPool,
        token: &str,
        user_id: DbId,
        accept: bool,
    ) -> Result<Option<ProjectCollaborator>, sqlx::Error> {
        let query = format!(
            "UPDATE project_collaborators SET
                status = CASE WHEN $3 THEN '{active}' ELSE '{declined}' END,
                joined_at = CASE WHEN $3 THEN NOW() ELSE NULL END,
                last_access = CASE WHEN $3 THEN NOW() ELSE last_access END,
                invitation_token = NULL
             WHERE invitation_token = $1 AND user_id = $2 AND status = '{pending}'
             RETURNING {COLUMNS}",
            active = collaborator_status::ACTIVE,
            declined = collaborator_status::DECLINED,
            pending = collaborator_status::PENDING,
        );
        sqlx::query_as::<_, ProjectCollaborator>(&query)
            .bind(token)
            .bind(user_id)
            .bind(accept)
            .fetch_optional(pool)
            .await
    }

    /// Pending and active collaborators with their user details.
    pub async fn list_for_project(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<Vec<CollaboratorWithUser>, sqlx::Error> {
        let query = format!(
            "SELECT {C_COLUMNS}, u.username, u.email
             FROM project_collaborators c JOIN users u ON u.id = c.user_id
             WHERE c.project_id = $1 AND c.status IN ('{pending}', '{active}')
             ORDER BY c.invited_at",
            pending = collaborator_status::PENDING,
            active = collaborator_status::ACTIVE,
        );
        sqlx::query_as::<_, CollaboratorWithUser>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    /// Seats taken on a project: pending plus active.
    pub async fn count_seats(pool: &PgPool, project_id: DbId) -> Result<i64, sqlx::Error> {
        let query = format!(
            "SELECT COUNT(*) FROM project_collaborators
             WHERE project_id = $1 AND status IN ('{pending}', '{active}')",
            pending = collaborator_status::PENDING,
            active = collaborator_status::ACTIVE,
        );
        sqlx::query_scalar(&query)
            .bind(project_id)
            .fetch_one(pool)
            .await
    }

    pub async fn update_role(
        pool: &PgPool,
        project_id: DbId,
        user_id: DbId,
        role: &str,
        permissions: Option<&serde_json::Value>,
    ) -> Result<Option<ProjectCollaborator>, sqlx::Error> {
        let query = format!(
            "UPDATE project_collaborators SET
                role = $3,
                permissions = COALESCE($4, permissions)
             WHERE project_id = $1 AND user_id = $2 AND status IN ('{pending}', '{active}')
             RETURNING {COLUMNS}",
            pending = collaborator_status::PENDING,
            active = collaborator_status::ACTIVE,
        );
        sqlx::query_as::<_, ProjectCollaborator>(&query)
            .bind(project_id)
            .bind(user_id)
            .bind(role)
            .bind(permissions)
            .fetch_optional(pool)
            .await
    }

    /// Mark a collaborator removed. Returns `true` if a live row changed.
    pub async fn remove(pool: &PgPool, project_id: DbId, user_id: DbId) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE project_collaborators SET status = '{removed}', invitation_token = NULL
             WHERE project_id = $1 AND user_id = $2 AND status IN ('{pending}', '{active}')",
            removed = collaborator_status::REMOVED,
            pending = collaborator_status::PENDING,
            active = collaborator_status::ACTIVE,
        );
        let result = sqlx::query(&query)
            .bind(project_id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Stamp `last_access` for an active collaborator.
    pub async fn touch(pool: &PgPool, project_id: DbId, user_id: DbId) -> Result<(), sqlx::Error> {
        let query = format!(
            "UPDATE project_collaborators SET last_access = NOW()
             WHERE project_id = $1 AND user_id = $2 AND status = '{active}'",
            active = collaborator_status::ACTIVE,
        );
        sqlx::query(&query)
            .bind(project_id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Collaborator and comment totals for the analytics endpoint. Active
    /// collaborators are those seen in the last week.
    pub async fn counts(pool: &PgPool, project_id: DbId) -> Result<CollaborationCounts, sqlx::Error> {
        let query = format!(
            "SELECT
                (SELECT COUNT(*) FROM project_collaborators
                  WHERE project_id = $1 AND status = '{active}') AS total_collaborators,
                (SELECT COUNT(*) FROM project_collaborators
                  WHERE project_id = $1 AND status = '{active}'
                    AND last_access >= NOW() - make_interval(days => $2)) AS active_collaborators,
                (SELECT COUNT(*) FROM comments WHERE project_id = $1) AS total_comments,
                (SELECT COUNT(*) FROM comments
                  WHERE project_id = $1 AND is_resolved) AS resolved_comments",
            active = collaborator_status::ACTIVE,
        );
        sqlx::query_as::<_, CollaborationCounts>(&query)
            .bind(project_id)
            .bind(ACTIVE_COLLABORATOR_DAYS as i32)
            .fetch_one(pool)
            .await
    }
}
