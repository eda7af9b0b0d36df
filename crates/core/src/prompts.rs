//! Prompt builders for every AI-backed operation.
//!
//! Inputs are lightweight view structs so this module does not depend on the
//! database layer. Each builder returns a [`Prompt`] with the system
//! instructions, the user message and the completion budget.

use serde::{Deserialize, Serialize};

use crate::types::DbId;

/// A ready-to-send completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
}

/// The slice of a project the prompts need.
#[derive(Debug, Clone, Default)]
pub struct ProjectView {
    pub title: String,
    pub genre: Option<String>,
    pub description: Option<String>,
}

/// The slice of a scene the prompts need.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SceneView {
    pub id: DbId,
    pub title: String,
    pub description: Option<String>,
    pub scene_type: Option<String>,
    pub order_index: i32,
    pub emotional_intensity: Option<f64>,
    pub conflict: Option<String>,
    pub location: Option<String>,
}

/// The slice of a story object the prompts need.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ObjectView {
    pub name: String,
    pub object_type: String,
    pub description: Option<String>,
    pub status: String,
    /// Number of scenes the object is linked to.
    pub scene_count: i64,
}

/// Narrative style knobs for full story generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeOptions {
    #[serde(alias = "narrativeVoice")]
    pub narrative_voice: String,
    #[serde(alias = "proseStyle")]
    pub prose_style: String,
    #[serde(alias = "dialogStyle")]
    pub dialog_style: String,
    #[serde(alias = "tonePreference")]
    pub tone_preference: String,
}

impl Default for NarrativeOptions {
    fn default() -> Self {
        Self {
            narrative_voice: "third_person_limited".into(),
            prose_style: "balanced".into(),
            dialog_style: "direct".into(),
            tone_preference: "dramatic".into(),
        }
    }
}

const UNSPECIFIED: &str = "not specified";

fn or_unspecified(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => UNSPECIFIED,
    }
}

fn scene_lines(scenes: &[SceneView]) -> String {
    scenes
        .iter()
        .enumerate()
        .map(|(i, s)| {
            format!(
                "Scene {} ({}): {}\n{}",
                i + 1,
                s.scene_type.as_deref().unwrap_or("development"),
                s.title,
                s.description.as_deref().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn object_lines(objects: &[ObjectView]) -> String {
    if objects.is_empty() {
        return "(none)".to_string();
    }
    objects
        .iter()
        .map(|o| {
            format!(
                "- {} ({}): {}",
                o.name,
                o.object_type,
                o.description.as_deref().unwrap_or("key story element")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Analyzer prompts
// ---------------------------------------------------------------------------

pub fn idea_analysis(idea: &str, intent: Option<&str>) -> Prompt {
    let system = "You are a development editor who turns raw story ideas into \
                  workable projects. Assess genre, tone, audience and scope, pull out \
                  the characters, locations, objects and conflicts the idea implies, \
                  and propose an opening scene. Answer with a single JSON object."
        .to_string();

    let intent_line = intent
        .filter(|i| !i.trim().is_empty())
        .map(|i| format!("\nAUTHOR INTENT: {i}\n"))
        .unwrap_or_default();

    let user = format!(
        r#"Analyze this story idea:

IDEA: {idea}
{intent_line}
Return JSON in this shape:
{{
  "story_assessment": {{"genre": "", "tone": "", "target_audience": "", "estimated_scope": "short-story|novella|novel", "themes": [], "marketability": 1-5}},
  "extracted_objects": {{"characters": [], "locations": [], "objects": [], "conflicts": []}},
  "first_scene_suggestion": {{"title": "", "description": "", "scene_type": "opening", "location": "", "objects": [], "hook": "", "conflict": ""}},
  "project_suggestions": {{"title": "", "description": "", "target_length": "words"}},
  "next_steps": {{"immediate_actions": [], "development_areas": [], "potential_subplots": []}}
}}"#
    );

    Prompt {
        system,
        user,
        max_tokens: 2000,
    }
}

pub fn scene_objects(scene_description: &str, project_context: &str) -> Prompt {
    let system = "You extract story elements from scene descriptions. List only \
                  elements that actually appear in the text. Answer with a single JSON object."
        .to_string();

    let context = if project_context.trim().is_empty() {
        String::new()
    } else {
        format!("PROJECT CONTEXT: {project_context}\n\n")
    };

    let user = format!(
        r#"{context}SCENE: {scene_description}

Return JSON:
{{"characters": [], "locations": [], "objects": [], "conflicts": []}}"#
    );

    Prompt {
        system,
        user,
        max_tokens: 1000,
    }
}

pub fn structure_analysis(project: &ProjectView, scenes: &[SceneView]) -> Prompt {
    let system = "You are a dramaturg. Evaluate story structure: act balance, \
                  the dramatic curve, pacing, continuity and missing beats. Answer with a \
                  single JSON object."
        .to_string();

    let user = format!(
        r#"PROJECT: {} ({})
SCENES ({}):
{}

Return JSON:
{{
  "total_scenes": {},
  "continuity_score": 0.0-1.0,
  "pacing_score": 0.0-1.0,
  "scene_types": {{"type": count}},
  "missing_elements": [],
  "recommendations": [],
  "strengths": []
}}"#,
        project.title,
        or_unspecified(project.genre.as_deref()),
        scenes.len(),
        scene_lines(scenes),
        scenes.len()
    );

    Prompt {
        system,
        user,
        max_tokens: 2000,
    }
}

pub fn next_scenes(project: &ProjectView, scenes: &[SceneView], objects: &[ObjectView]) -> Prompt {
    let system = "You are a story consultant. Propose the next scenes that best \
                  advance the story, favouring objects that have not been used yet. \
                  Answer with a JSON array of at most three scenes."
        .to_string();

    let unused: Vec<&str> = objects
        .iter()
        .filter(|o| o.scene_count == 0)
        .map(|o| o.name.as_str())
        .collect();

    let user = format!(
        r#"PROJECT: {} ({})
EXISTING SCENES:
{}

OBJECTS:
{}

UNUSED OBJECTS: {}

Return a JSON array:
[{{"title": "", "description": "", "scene_type": "", "suggested_objects": [], "confidence": 0.0-1.0}}]"#,
        project.title,
        or_unspecified(project.genre.as_deref()),
        scene_lines(scenes),
        object_lines(objects),
        if unused.is_empty() { "(none)".to_string() } else { unused.join(", ") }
    );

    Prompt {
        system,
        user,
        max_tokens: 1500,
    }
}

pub fn story_summary(project: &ProjectView, scenes: &[SceneView], objects: &[ObjectView]) -> Prompt {
    let system = "You are a literary analyst. Summarize the story the scenes tell: \
                  theme, character arcs, central conflict, symbols and overall shape. \
                  Answer with a single JSON object."
        .to_string();

    let user = format!(
        r#"PROJECT: {}
GENRE: {}

SCENES:
{}

KEY OBJECTS:
{}

Return JSON:
{{
  "title": "", "premise": "", "theme": "", "protagonist": "", "antagonist": "",
  "central_conflict": "", "story_arc": "", "key_symbols": [], "tone": "",
  "target_audience": "", "estimated_length": "", "marketability": "", "unique_elements": []
}}"#,
        project.title,
        or_unspecified(project.genre.as_deref()),
        scene_lines(scenes),
        object_lines(objects)
    );

    Prompt {
        system,
        user,
        max_tokens: 2000,
    }
}

// ---------------------------------------------------------------------------
// Critic prompts
// ---------------------------------------------------------------------------

pub fn structure_critique(project: &ProjectView, scenes: &[SceneView]) -> Prompt {
    let system = "You are Professor Syntax, a critic of story structure. Judge \
                  three-act shape, the dramatic curve and pacing. Be direct and \
                  constructive and score from 1 to 5. Answer with a single JSON object."
        .to_string();

    let lines = scenes
        .iter()
        .enumerate()
        .map(|(i, s)| {
            format!(
                "Scene {} ({}): {}\nIntensity: {}\nConflict: {}",
                i + 1,
                s.scene_type.as_deref().unwrap_or("development"),
                s.title,
                s.emotional_intensity.unwrap_or(0.5),
                or_unspecified(s.conflict.as_deref())
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let user = format!(
        r#"PROJECT: {} ({})
SCENES ({}):
{}

Return JSON:
{{"critic_name": "Professor Syntax", "score": 1-5, "main_feedback": "", "strengths": [],
  "weaknesses": [], "recommendations": [], "structure_analysis": "", "pacing_notes": ""}}"#,
        project.title,
        or_unspecified(project.genre.as_deref()),
        scenes.len(),
        lines
    );

    Prompt {
        system,
        user,
        max_tokens: 1500,
    }
}

pub fn character_critique(
    project: &ProjectView,
    scenes: &[SceneView],
    characters: &[ObjectView],
) -> Prompt {
    let system = "You are the Character Whisperer, a critic of characterization. \
                  Judge motivation, growth, relationships and dialogue. Score from 1 to 5. \
                  Answer with a single JSON object."
        .to_string();

    let user = format!(
        r#"PROJECT: {}
CHARACTERS:
{}

SCENES:
{}

Return JSON:
{{"critic_name": "Character Whisperer", "score": 1-5, "main_feedback": "",
  "character_analysis": {{"name": "arc analysis"}}, "relationship_dynamics": "",
  "dialogue_quality": "", "recommendations": []}}"#,
        project.title,
        object_lines(characters),
        scene_lines(scenes)
    );

    Prompt {
        system,
        user,
        max_tokens: 1500,
    }
}

pub fn object_flow_critique(
    project: &ProjectView,
    scenes: &[SceneView],
    objects: &[ObjectView],
) -> Prompt {
    let system = "You are the Object Flow Analyzer. Judge how story objects are \
                  introduced, reused and paid off across scenes. Score from 1 to 5. \
                  Answer with a single JSON object."
        .to_string();

    let usage = objects
        .iter()
        .map(|o| format!("- {} ({}): {} scene(s), {}", o.name, o.object_type, o.scene_count, o.status))
        .collect::<Vec<_>>()
        .join("\n");

    let user = format!(
        r#"PROJECT: {}
OBJECT USAGE:
{}

SCENES:
{}

Return JSON:
{{"critic_name": "Object Flow Analyzer", "score": 1-5, "main_feedback": "",
  "well_used_objects": [], "underutilized_objects": [], "object_potential": {{"object": "potential"}},
  "continuity_issues": [], "recommendations": []}}"#,
        project.title,
        if usage.is_empty() { "(none)".to_string() } else { usage },
        scene_lines(scenes)
    );

    Prompt {
        system,
        user,
        max_tokens: 1500,
    }
}

// ---------------------------------------------------------------------------
// Story writing prompts
// ---------------------------------------------------------------------------

fn style_block(options: &NarrativeOptions) -> String {
    format!(
        "- Narrative voice: {}\n- Prose style: {}\n- Dialog style: {}\n- Tone: {}",
        options.narrative_voice, options.prose_style, options.dialog_style, options.tone_preference
    )
}

fn scenes_json(scenes: &[SceneView]) -> String {
    serde_json::to_string_pretty(scenes).unwrap_or_else(|_| "[]".to_string())
}

pub fn full_story(
    project: &ProjectView,
    scenes: &[SceneView],
    objects: &[ObjectView],
    options: &NarrativeOptions,
) -> Prompt {
    let system = "You are a professional novelist who turns structured scene outlines \
                  into cohesive prose. Reply with only the requested JSON object."
        .to_string();

    let user = format!(
        r#"Write the complete story for this project.

TITLE: {}
GENRE: {}
PREMISE: {}

STYLE
{}

SCENES
{}

STORY OBJECTS
{}

Return JSON:
```json
{{
  "title": "", "premise": "", "content": "full story text", "wordCount": 0,
  "metadata": {{"genre": "", "theme": "", "targetAudience": "", "tone": "", "uniqueElements": [], "keySymbols": []}},
  "chapters": [{{"title": "", "content": "", "scenes": [scene ids]}}]
}}
```
Group scenes into logical chapters, keep the emotional arc intact and weave
the objects in naturally."#,
        project.title,
        or_unspecified(project.genre.as_deref()),
        or_unspecified(project.description.as_deref()),
        style_block(options),
        scenes_json(scenes),
        object_lines(objects)
    );

    Prompt {
        system,
        user,
        max_tokens: 12_000,
    }
}

pub fn chapter_rewrite(
    project: &ProjectView,
    chapter_title: &str,
    scenes: &[SceneView],
    options: &NarrativeOptions,
) -> Prompt {
    let system = "You are a professional novelist revising a single chapter. \
                  Reply with only the requested JSON object."
        .to_string();

    let user = format!(
        r#"Rewrite the chapter "{chapter_title}" of "{}".

STYLE
{}

SCENES IN THIS CHAPTER
{}

Return JSON:
```json
{{"title": "", "content": ""}}
```"#,
        project.title,
        style_block(options),
        scenes_json(scenes)
    );

    Prompt {
        system,
        user,
        max_tokens: 6_000,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> ProjectView {
        ProjectView {
            title: "The Archive".into(),
            genre: Some("mystery".into()),
            description: None,
        }
    }

    fn scene(id: DbId, title: &str) -> SceneView {
        SceneView {
            id,
            title: title.into(),
            scene_type: Some("opening".into()),
            ..Default::default()
        }
    }

    #[test]
    fn idea_prompt_includes_intent_only_when_given() {
        let with = idea_analysis("A librarian finds a letter", Some("literary"));
        assert!(with.user.contains("AUTHOR INTENT: literary"));
        let without = idea_analysis("A librarian finds a letter", Some("  "));
        assert!(!without.user.contains("AUTHOR INTENT"));
    }

    #[test]
    fn structure_prompt_lists_scenes() {
        let p = structure_analysis(&project(), &[scene(1, "Arrival"), scene(2, "Letter")]);
        assert!(p.user.contains("SCENES (2)"));
        assert!(p.user.contains("Scene 2 (opening): Letter"));
        assert!(p.user.contains("(mystery)"));
    }

    #[test]
    fn next_scene_prompt_names_unused_objects() {
        let objects = vec![
            ObjectView { name: "Key".into(), object_type: "prop".into(), status: "unused".into(), ..Default::default() },
            ObjectView { name: "Anna".into(), object_type: "character".into(), status: "active".into(), scene_count: 2, ..Default::default() },
        ];
        let p = next_scenes(&project(), &[], &objects);
        assert!(p.user.contains("UNUSED OBJECTS: Key"));
    }

    #[test]
    fn narrative_options_accept_camel_case() {
        let opts: NarrativeOptions =
            serde_json::from_str(r#"{"narrativeVoice": "first_person"}"#).unwrap();
        assert_eq!(opts.narrative_voice, "first_person");
        assert_eq!(opts.prose_style, "balanced");
        let p = full_story(&project(), &[scene(1, "Arrival")], &[], &opts);
        assert!(p.user.contains("Narrative voice: first_person"));
        assert_eq!(p.max_tokens, 12_000);
    }
}
