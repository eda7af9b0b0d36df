//! Extraction and typed parsing of JSON embedded in free-form LLM replies.
//!
//! Models are asked to answer with JSON but often wrap it in prose or a
//! fenced code block. [`extract_json_object`] and [`extract_json_array`] find
//! the payload; the response structs below use `#[serde(default)]` so that
//! any key the model leaves out takes a documented default.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::story::{scene_types, ObjectKind};
use crate::types::DbId;

static FENCED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("valid regex"));
static OBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));
static ARRAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[.*\]").expect("valid regex"));

/// Maximum number of next-scene suggestions returned to clients.
pub const MAX_SCENE_SUGGESTIONS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("no JSON payload found in model response")]
    NoJson,

    #[error("malformed JSON payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

fn fenced_block(text: &str) -> Option<&str> {
    FENCED_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Find the JSON object in `text`: a fenced block if present, otherwise the
/// span from the first `{` to the last `}`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    if let Some(block) = fenced_block(text) {
        if block.starts_with('{') {
            return Some(block);
        }
    }
    OBJECT_RE.find(text).map(|m| m.as_str())
}

/// Find the JSON array in `text`, same rules as [`extract_json_object`].
pub fn extract_json_array(text: &str) -> Option<&str> {
    if let Some(block) = fenced_block(text) {
        if block.starts_with('[') {
            return Some(block);
        }
    }
    ARRAY_RE.find(text).map(|m| m.as_str())
}

/// Extract and deserialize the JSON object in `text`.
pub fn parse_object<T: DeserializeOwned>(text: &str) -> Result<T, ParseError> {
    let raw = extract_json_object(text).ok_or(ParseError::NoJson)?;
    Ok(serde_json::from_str(raw)?)
}

/// Extract and deserialize the JSON array in `text`.
pub fn parse_array<T: DeserializeOwned>(text: &str) -> Result<Vec<T>, ParseError> {
    let raw = extract_json_array(text).ok_or(ParseError::NoJson)?;
    Ok(serde_json::from_str(raw)?)
}

// ---------------------------------------------------------------------------
// Lenient field helpers
// ---------------------------------------------------------------------------

/// Accept a number or a numeric string; anything else becomes `None`.
fn lenient_f64<'de, D: Deserializer<'de>>(de: D) -> Result<Option<f64>, D::Error> {
    let value = serde_json::Value::deserialize(de)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Accept a string or a number rendered as a string.
fn lenient_string<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(de)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Scene references may come back as numbers or numeric strings.
fn lenient_ids<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<DbId>, D::Error> {
    let values = Vec::<serde_json::Value>::deserialize(de)?;
    Ok(values
        .into_iter()
        .filter_map(|v| match v {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Idea analysis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdeaAnalysis {
    pub story_assessment: StoryAssessment,
    pub extracted_objects: ExtractedObjects,
    pub first_scene_suggestion: FirstSceneSuggestion,
    pub project_suggestions: ProjectSuggestions,
    pub next_steps: NextSteps,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryAssessment {
    pub genre: String,
    pub tone: String,
    pub target_audience: String,
    pub estimated_scope: String,
    pub themes: Vec<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub marketability: Option<f64>,
}

impl Default for StoryAssessment {
    fn default() -> Self {
        Self {
            genre: "drama".into(),
            tone: "balanced".into(),
            target_audience: "general".into(),
            estimated_scope: "short-story".into(),
            themes: Vec::new(),
            marketability: Some(3.0),
        }
    }
}

impl StoryAssessment {
    /// Marketability as stored on projects: rounded and clamped to 1..=5.
    pub fn marketability_score(&self) -> i32 {
        self.marketability.map_or(3, |m| (m.round() as i32).clamp(1, 5))
    }
}

/// Object names grouped by the categories the model is asked for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedObjects {
    pub characters: Vec<String>,
    pub locations: Vec<String>,
    pub objects: Vec<String>,
    pub conflicts: Vec<String>,
}

impl ExtractedObjects {
    /// Flatten into `(kind, name)` pairs, dropping blanks and duplicates.
    pub fn by_kind(&self) -> Vec<(ObjectKind, String)> {
        let groups = [
            (ObjectKind::Character, &self.characters),
            (ObjectKind::Location, &self.locations),
            (ObjectKind::Prop, &self.objects),
            (ObjectKind::Conflict, &self.conflicts),
        ];
        let mut out: Vec<(ObjectKind, String)> = Vec::new();
        for (kind, names) in groups {
            for name in names {
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                if !out.iter().any(|(k, n)| *k == kind && n.eq_ignore_ascii_case(name)) {
                    out.push((kind, name.to_string()));
                }
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
            && self.locations.is_empty()
            && self.objects.is_empty()
            && self.conflicts.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirstSceneSuggestion {
    pub title: String,
    pub description: String,
    pub scene_type: String,
    pub location: String,
    pub objects: Vec<String>,
    pub hook: String,
    pub conflict: String,
}

impl Default for FirstSceneSuggestion {
    fn default() -> Self {
        Self {
            title: "Opening scene".into(),
            description: "The opening scene of the story".into(),
            scene_type: scene_types::OPENING.into(),
            location: String::new(),
            objects: Vec::new(),
            hook: String::new(),
            conflict: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSuggestions {
    pub title: String,
    pub description: String,
    #[serde(deserialize_with = "lenient_string")]
    pub target_length: String,
}

impl Default for ProjectSuggestions {
    fn default() -> Self {
        Self {
            title: "New project".into(),
            description: "A story grown from an idea".into(),
            target_length: "10000".into(),
        }
    }
}

impl ProjectSuggestions {
    /// Parse the suggested length (e.g. `"15000"` or `"15 000 words"`) as words.
    pub fn target_word_count(&self) -> Option<i32> {
        let digits: String = self
            .target_length
            .chars()
            .take_while(|c| c.is_ascii_digit() || c.is_whitespace() || *c == ',')
            .filter(char::is_ascii_digit)
            .collect();
        digits.parse().ok().filter(|n: &i32| *n > 0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NextSteps {
    pub immediate_actions: Vec<String>,
    pub development_areas: Vec<String>,
    pub potential_subplots: Vec<String>,
}

// ---------------------------------------------------------------------------
// Structure analysis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureAnalysis {
    pub total_scenes: Option<i64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub continuity_score: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub pacing_score: Option<f64>,
    pub scene_types: BTreeMap<String, i64>,
    pub missing_elements: Vec<String>,
    pub recommendations: Vec<String>,
    pub strengths: Vec<String>,
}

impl Default for StructureAnalysis {
    fn default() -> Self {
        Self {
            total_scenes: None,
            continuity_score: Some(DEFAULT_CONTINUITY_SCORE),
            pacing_score: Some(DEFAULT_PACING_SCORE),
            scene_types: BTreeMap::new(),
            missing_elements: Vec::new(),
            recommendations: Vec::new(),
            strengths: Vec::new(),
        }
    }
}

pub const DEFAULT_CONTINUITY_SCORE: f64 = 0.75;
pub const DEFAULT_PACING_SCORE: f64 = 0.7;

/// Parse a structure analysis, filling `total_scenes` and scores when absent.
pub fn parse_structure_analysis(text: &str, scene_count: usize) -> Result<StructureAnalysis, ParseError> {
    let mut analysis: StructureAnalysis = parse_object(text)?;
    analysis.total_scenes.get_or_insert(scene_count as i64);
    analysis.continuity_score.get_or_insert(DEFAULT_CONTINUITY_SCORE);
    analysis.pacing_score.get_or_insert(DEFAULT_PACING_SCORE);
    Ok(analysis)
}

// ---------------------------------------------------------------------------
// Scene suggestions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSuggestion {
    pub title: String,
    pub description: String,
    pub scene_type: String,
    pub suggested_objects: Vec<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub confidence: Option<f64>,
}

impl Default for SceneSuggestion {
    fn default() -> Self {
        Self {
            title: "Untitled scene".into(),
            description: String::new(),
            scene_type: scene_types::DEVELOPMENT.into(),
            suggested_objects: Vec::new(),
            confidence: Some(0.7),
        }
    }
}

/// Parse next-scene suggestions, keeping at most [`MAX_SCENE_SUGGESTIONS`].
pub fn parse_scene_suggestions(text: &str) -> Result<Vec<SceneSuggestion>, ParseError> {
    let mut suggestions: Vec<SceneSuggestion> = parse_array(text)?;
    suggestions.truncate(MAX_SCENE_SUGGESTIONS);
    Ok(suggestions)
}

// ---------------------------------------------------------------------------
// Story summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorySummary {
    pub title: String,
    pub premise: String,
    pub theme: String,
    pub protagonist: String,
    pub antagonist: String,
    pub central_conflict: String,
    pub story_arc: String,
    pub key_symbols: Vec<String>,
    pub tone: String,
    pub target_audience: String,
    #[serde(deserialize_with = "lenient_string")]
    pub estimated_length: String,
    #[serde(deserialize_with = "lenient_string")]
    pub marketability: String,
    pub unique_elements: Vec<String>,
    /// Filled in by the caller from the project, never by the model.
    pub scene_count: i64,
    pub object_count: i64,
    pub characters: Vec<String>,
}

// ---------------------------------------------------------------------------
// Critiques
// ---------------------------------------------------------------------------

/// Feedback from one critic persona. Persona-specific fields are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Critique {
    pub critic_name: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub score: Option<f64>,
    pub main_feedback: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendations: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Full story generation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeneratedStory {
    pub title: String,
    pub premise: String,
    pub content: String,
    pub word_count: Option<i64>,
    pub metadata: Option<StoryMetadata>,
    pub chapters: Option<Vec<GeneratedChapter>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoryMetadata {
    pub genre: String,
    pub theme: String,
    pub target_audience: String,
    pub tone: String,
    pub unique_elements: Vec<String>,
    pub key_symbols: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratedChapter {
    pub title: String,
    pub content: String,
    #[serde(deserialize_with = "lenient_ids")]
    pub scenes: Vec<DbId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegeneratedChapter {
    pub title: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn extracts_object_from_prose() {
        let text = "Sure! Here you go:\n{\"a\": 1, \"b\": {\"c\": 2}}\nHope that helps.";
        assert_eq!(extract_json_object(text), Some("{\"a\": 1, \"b\": {\"c\": 2}}"));
    }

    #[test]
    fn prefers_fenced_block() {
        let text = "Note {not json}\n```json\n{\"title\": \"X\"}\n```\ntrailing }";
        assert_eq!(extract_json_object(text), Some("{\"title\": \"X\"}"));
    }

    #[test]
    fn extracts_array() {
        let text = "Suggestions: [{\"title\": \"A\"}, {\"title\": \"B\"}] done";
        let parsed: Vec<SceneSuggestion> = parse_array(text).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].title, "B");
        assert_eq!(parsed[1].scene_type, "development");
    }

    #[test]
    fn missing_json_is_reported() {
        assert_matches!(parse_object::<IdeaAnalysis>("no braces here"), Err(ParseError::NoJson));
        assert_matches!(parse_object::<IdeaAnalysis>("{ nope }"), Err(ParseError::Malformed(_)));
    }

    #[test]
    fn idea_analysis_fills_defaults() {
        let text = r#"{"story_assessment": {"genre": "mystery", "marketability": "4"},
                       "extracted_objects": {"characters": ["Anna"]}}"#;
        let analysis: IdeaAnalysis = parse_object(text).unwrap();
        assert_eq!(analysis.story_assessment.genre, "mystery");
        assert_eq!(analysis.story_assessment.tone, "balanced");
        assert_eq!(analysis.story_assessment.marketability_score(), 4);
        assert_eq!(analysis.extracted_objects.characters, vec!["Anna"]);
        assert!(analysis.extracted_objects.locations.is_empty());
        assert_eq!(analysis.first_scene_suggestion.scene_type, "opening");
        assert_eq!(analysis.project_suggestions.target_length, "10000");
    }

    #[test]
    fn marketability_is_clamped() {
        let mut a = StoryAssessment::default();
        a.marketability = Some(9.0);
        assert_eq!(a.marketability_score(), 5);
        a.marketability = None;
        assert_eq!(a.marketability_score(), 3);
    }

    #[test]
    fn target_length_accepts_numbers_and_text() {
        let p: ProjectSuggestions = serde_json::from_str(r#"{"target_length": 15000}"#).unwrap();
        assert_eq!(p.target_word_count(), Some(15000));
        let p: ProjectSuggestions =
            serde_json::from_str(r#"{"target_length": "20,000 words"}"#).unwrap();
        assert_eq!(p.target_word_count(), Some(20000));
        let p: ProjectSuggestions = serde_json::from_str(r#"{"target_length": "long"}"#).unwrap();
        assert_eq!(p.target_word_count(), None);
    }

    #[test]
    fn objects_flatten_by_kind_without_duplicates() {
        let objects = ExtractedObjects {
            characters: vec!["Anna".into(), "anna".into(), " ".into()],
            locations: vec!["Library".into()],
            objects: vec!["Letter".into()],
            conflicts: vec![],
        };
        let flat = objects.by_kind();
        assert_eq!(
            flat,
            vec![
                (ObjectKind::Character, "Anna".to_string()),
                (ObjectKind::Location, "Library".to_string()),
                (ObjectKind::Prop, "Letter".to_string()),
            ]
        );
    }

    #[test]
    fn structure_defaults_use_scene_count() {
        let analysis = parse_structure_analysis(r#"{"recommendations": ["More tension"]}"#, 4).unwrap();
        assert_eq!(analysis.total_scenes, Some(4));
        assert_eq!(analysis.continuity_score, Some(0.75));
        assert_eq!(analysis.pacing_score, Some(0.7));
        assert_eq!(analysis.recommendations, vec!["More tension"]);
    }

    #[test]
    fn suggestions_are_capped() {
        let text = r#"[{"title":"1"},{"title":"2"},{"title":"3"},{"title":"4"}]"#;
        assert_eq!(parse_scene_suggestions(text).unwrap().len(), 3);
    }

    #[test]
    fn critique_keeps_persona_fields() {
        let text = r#"{"critic_name": "Someone", "score": 3.5, "pacing_notes": "slow middle"}"#;
        let critique: Critique = parse_object(text).unwrap();
        assert_eq!(critique.score, Some(3.5));
        assert_eq!(critique.extra["pacing_notes"], "slow middle");
    }

    #[test]
    fn generated_story_reads_camel_case_and_string_ids() {
        let text = r#"```json
{"title": "T", "content": "Once.", "wordCount": 1,
 "metadata": {"targetAudience": "adults", "keySymbols": ["key"]},
 "chapters": [{"title": "One", "content": "Once.", "scenes": ["3", 4, "x"]}]}
```"#;
        let story: GeneratedStory = parse_object(text).unwrap();
        assert_eq!(story.word_count, Some(1));
        let meta = story.metadata.unwrap();
        assert_eq!(meta.target_audience, "adults");
        assert_eq!(meta.key_symbols, vec!["key"]);
        assert_eq!(story.chapters.unwrap()[0].scenes, vec![3, 4]);
    }
}
