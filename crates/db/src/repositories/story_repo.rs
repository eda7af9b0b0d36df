//! Repository for the `stories` and `story_chapters` tables.

use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use storyforge_core::types::DbId;

use crate::models::story::{SaveStory, Story, StoryChapter, StoryWithChapters};

const STORY_COLUMNS: &str =
    "id, project_id, title, premise, content, metadata, word_count, created_at, updated_at";

const CHAPTER_COLUMNS: &str =
    "id, story_id, title, content, scene_ids, sort_order, created_at, updated_at";

pub struct StoryRepo;

impl StoryRepo {
    /// The project's story with chapters in order, if one was generated.
    pub async fn find_for_project(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<Option<StoryWithChapters>, sqlx::Error> {
        let query = format!("SELECT {STORY_COLUMNS} FROM stories WHERE project_id = $1");
        let Some(story) = sqlx::query_as::<_, Story>(&query)
            .bind(project_id)
            .fetch_optional(pool)
            .await?
        else {
            return Ok(None);
        };

        let chapters = Self::list_chapters(pool, story.id).await?;
        Ok(Some(StoryWithChapters { story, chapters }))
    }

    pub async fn list_chapters<'e>(
        db: impl PgExecutor<'e>,
        story_id: DbId,
    ) -> Result<Vec<StoryChapter>, sqlx::Error> {
        let query = format!(
            "SELECT {CHAPTER_COLUMNS} FROM story_chapters WHERE story_id = $1 ORDER BY sort_order"
        );
        sqlx::query_as::<_, StoryChapter>(&query)
            .bind(story_id)
            .fetch_all(db)
            .await
    }

    /// Replace the project's story and all of its chapters in one
    /// transaction.
    pub async fn save(
        pool: &PgPool,
        project_id: DbId,
        input: &SaveStory,
    ) -> Result<StoryWithChapters, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let saved = Self::save_in_tx(&mut tx, project_id, input).await?;
        tx.commit().await?;
        Ok(saved)
    }

    /// [`StoryRepo::save`] within an existing transaction.
    pub async fn save_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        project_id: DbId,
        input: &SaveStory,
    ) -> Result<StoryWithChapters, sqlx::Error> {
        let query = format!(
            "INSERT INTO stories (project_id, title, premise, content, metadata, word_count)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT ON CONSTRAINT uq_stories_project DO UPDATE SET
                title = EXCLUDED.title,
                premise = EXCLUDED.premise,
                content = EXCLUDED.content,
                metadata = EXCLUDED.metadata,
                word_count = EXCLUDED.word_count
             RETURNING {STORY_COLUMNS}"
        );
        let story = sqlx::query_as::<_, Story>(&query)
            .bind(project_id)
            .bind(&input.title)
            .bind(&input.premise)
            .bind(&input.content)
            .bind(&input.metadata)
            .bind(input.word_count)
            .fetch_one(&mut **tx)
            .await?;

        sqlx::query("DELETE FROM story_chapters WHERE story_id = $1")
            .bind(story.id)
            .execute(&mut **tx)
            .await?;

        let query = format!(
            "INSERT INTO story_chapters (story_id, title, content, scene_ids, sort_order)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {CHAPTER_COLUMNS}"
        );
        let mut chapters = Vec::with_capacity(input.chapters.len());
        for (order, chapter) in input.chapters.iter().enumerate() {
            let row = sqlx::query_as::<_, StoryChapter>(&query)
                .bind(story.id)
                .bind(&chapter.title)
                .bind(&chapter.content)
                .bind(&chapter.scene_ids)
                .bind(order as i32)
                .fetch_one(&mut **tx)
                .await?;
            chapters.push(row);
        }

        Ok(StoryWithChapters { story, chapters })
    }

    /// Overwrite one chapter, then rebuild the story text from all chapters.
    /// Runs inside the caller's transaction.
    ///
    /// Returns `None` if the story has no chapter at `sort_order`.
    pub async fn replace_chapter(
        tx: &mut Transaction<'_, Postgres>,
        story_id: DbId,
        sort_order: i32,
        title: &str,
        content: &str,
    ) -> Result<Option<StoryWithChapters>, sqlx::Error> {
        let updated = sqlx::query(
            "UPDATE story_chapters SET title = $3, content = $4
             WHERE story_id = $1 AND sort_order = $2",
        )
        .bind(story_id)
        .bind(sort_order)
        .bind(title)
        .bind(content)
        .execute(&mut **tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        let story = sqlx::query_as::<_, Story>(
            "UPDATE stories SET
                content = sub.content,
                word_count = sub.words
             FROM (
                SELECT string_agg(content, E'\\n\\n' ORDER BY sort_order) AS content,
                       COALESCE(SUM(array_length(regexp_split_to_array(trim(content), '\\s+'), 1))
                                FILTER (WHERE trim(content) <> ''), 0)::INTEGER AS words
                FROM story_chapters WHERE story_id = $1
             ) sub
             WHERE stories.id = $1
             RETURNING stories.id, stories.project_id, stories.title, stories.premise,
                       stories.content, stories.metadata, stories.word_count,
                       stories.created_at, stories.updated_at",
        )
        .bind(story_id)
        .fetch_one(&mut **tx)
        .await?;

        let chapters = Self::list_chapters(&mut **tx, story_id).await?;
        Ok(Some(StoryWithChapters { story, chapters }))
    }
}
