//! Repository for the `comments` table.

use sqlx::PgPool;
use storyforge_core::collaboration::DEFAULT_COMMENT_TYPE;
use storyforge_core::types::DbId;

use crate::models::collaboration::{Comment, CreateComment};

/// Comment columns joined with the author's username (`c` / `u` aliases).
const COLUMNS: &str = "c.id, c.project_id, c.scene_id, c.user_id, u.username, \
                        c.parent_comment_id, c.thread_depth, c.content, c.comment_type, \
                        c.position_data, c.is_resolved, c.resolved_by, c.resolved_at, \
                        c.created_at, c.updated_at";

pub struct CommentRepo;

impl CommentRepo {
    /// Insert a comment at `thread_depth` (the parent's depth plus one for
    /// replies).
    pub async fn create(
        pool: &PgPool,
        project_id: DbId,
        user_id: DbId,
        thread_depth: i32,
        input: &CreateComment,
    ) -> Result<Comment, sqlx::Error> {
        let query = format!(
            "WITH c AS (
                INSERT INTO comments
                    (project_id, scene_id, user_id, parent_comment_id, thread_depth, content,
                     comment_type, position_data)
                VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, '{DEFAULT_COMMENT_TYPE}'), $8)
                RETURNING *
             )
             SELECT {COLUMNS} FROM c JOIN users u ON u.id = c.user_id"
        );
        sqlx::query_as::<_, Comment>(&query)
            .bind(project_id)
            .bind(input.scene_id)
            .bind(user_id)
            .bind(input.parent_comment_id)
            .bind(thread_depth)
            .bind(&input.content)
            .bind(&input.comment_type)
            .bind(&input.position_data)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Comment>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM comments c JOIN users u ON u.id = c.user_id WHERE c.id = $1"
        );
        sqlx::query_as::<_, Comment>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Oldest first so threads read top to bottom. `scene_id` narrows to one
    /// scene's comments.
    pub async fn list_for_project(
        pool: &PgPool,
        project_id: DbId,
        scene_id: Option<DbId>,
    ) -> Result<Vec<Comment>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM comments c JOIN users u ON u.id = c.user_id
             WHERE c.project_id = $1 AND ($2::BIGINT IS NULL OR c.scene_id = $2)
             ORDER BY c.created_at, c.id"
        );
        sqlx::query_as::<_, Comment>(&query)
            .bind(project_id)
            .bind(scene_id)
            .fetch_all(pool)
            .await
    }

    pub async fn resolve(
        pool: &PgPool,
        id: DbId,
        resolved_by: DbId,
    ) -> Result<Option<Comment>, sqlx::Error> {
        let query = format!(
            "WITH c AS (
                UPDATE comments SET is_resolved = true, resolved_by = $2, resolved_at = NOW()
                WHERE id = $1
                RETURNING *
             )
             SELECT {COLUMNS} FROM c JOIN users u ON u.id = c.user_id"
        );
        sqlx::query_as::<_, Comment>(&query)
            .bind(id)
            .bind(resolved_by)
            .fetch_optional(pool)
            .await
    }

    /// Delete a comment and its replies.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
