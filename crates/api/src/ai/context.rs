//! Loading a project into the view structs the prompt builders and
//! heuristics consume.

use storyforge_core::error::CoreError;
use storyforge_core::prompts::{ObjectView, ProjectView, SceneView};
use storyforge_core::story::ObjectKind;
use storyforge_core::types::DbId;
use storyforge_db::models::project::Project;
use storyforge_db::models::scene::Scene;
use storyforge_db::models::story_object::StoryObjectWithUsage;
use storyforge_db::repositories::{ProjectRepo, SceneRepo, StoryObjectRepo};
use storyforge_db::DbPool;

use crate::error::AppResult;

/// A project with its scenes (in story order) and objects.
pub struct StoryContext {
    pub project: Project,
    pub scenes: Vec<Scene>,
    pub objects: Vec<StoryObjectWithUsage>,
}

impl StoryContext {
    pub async fn load(pool: &DbPool, project_id: DbId) -> AppResult<Self> {
        let project = ProjectRepo::find_by_id(pool, project_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Project",
                id: project_id,
            })?;
        let scenes = SceneRepo::list_for_project(pool, project_id).await?;
        let objects = StoryObjectRepo::list_for_project(pool, project_id, None).await?;
        Ok(Self {
            project,
            scenes,
            objects,
        })
    }

    pub fn project_view(&self) -> ProjectView {
        project_view(&self.project)
    }

    pub fn scene_views(&self) -> Vec<SceneView> {
        self.scenes.iter().map(scene_view).collect()
    }

    pub fn object_views(&self) -> Vec<ObjectView> {
        self.objects.iter().map(object_view).collect()
    }

    pub fn character_views(&self) -> Vec<ObjectView> {
        self.objects
            .iter()
            .filter(|o| o.object.object_type == ObjectKind::Character.as_str())
            .map(object_view)
            .collect()
    }

    pub fn scene_ids(&self) -> Vec<DbId> {
        self.scenes.iter().map(|s| s.id).collect()
    }

    /// Text used to price operations over the whole project.
    pub fn pricing_text(&self) -> String {
        let mut text = self.project.title.clone();
        for scene in &self.scenes {
            text.push(' ');
            text.push_str(&scene.title);
            if let Some(description) = &scene.description {
                text.push(' ');
                text.push_str(description);
            }
        }
        text
    }
}

pub fn project_view(project: &Project) -> ProjectView {
    ProjectView {
        title: project.title.clone(),
        genre: project.genre.clone(),
        description: project.description.clone(),
    }
}

pub fn scene_view(scene: &Scene) -> SceneView {
    SceneView {
        id: scene.id,
        title: scene.title.clone(),
        description: scene.description.clone(),
        scene_type: Some(scene.scene_type.clone()),
        order_index: scene.order_index,
        emotional_intensity: Some(scene.emotional_intensity),
        conflict: scene.conflict.clone(),
        location: scene.location.clone(),
    }
}

pub fn object_view(object: &StoryObjectWithUsage) -> ObjectView {
    ObjectView {
        name: object.object.name.clone(),
        object_type: object.object.object_type.clone(),
        description: object.object.description.clone(),
        status: object.object.status.clone(),
        scene_count: object.scene_count,
    }
}
