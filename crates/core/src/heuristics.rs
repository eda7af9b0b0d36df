//! Keyword heuristics used when the LLM is unavailable or its reply cannot
//! be parsed.
//!
//! The keyword tables cover both English and Czech, the two languages the
//! product's authors write in.

use std::collections::BTreeMap;

use crate::ai_response::{
    ExtractedObjects, FirstSceneSuggestion, GeneratedChapter, GeneratedStory, IdeaAnalysis,
    NextSteps, ProjectSuggestions, SceneSuggestion, StoryAssessment, StoryMetadata,
    StructureAnalysis, StorySummary, DEFAULT_CONTINUITY_SCORE, DEFAULT_PACING_SCORE,
};
use crate::chapters::auto_chapters;
use crate::prompts::{NarrativeOptions, ObjectView, ProjectView, SceneView};
use crate::story::{object_status, scene_types};

// ---------------------------------------------------------------------------
// Keyword tables
// ---------------------------------------------------------------------------

const GENRE_KEYWORDS: &[(&str, &[&str])] = &[
    ("mystery", &["mystery", "secret", "clue", "cipher", "letter", "tajemství", "záhada", "dopis", "šifra"]),
    ("sci-fi", &["sci-fi", "future", "robot", "space", "budoucnost", "vesmír"]),
    ("romance", &["love", "romance", "heart", "láska", "srdce"]),
    ("fantasy", &["fantasy", "magic", "elf", "dwarf", "dragon", "magie", "trpaslík"]),
];

const DEFAULT_GENRE: &str = "drama";

/// `(keyword, canonical name)` pairs.
const CHARACTER_KEYWORDS: &[(&str, &str)] = &[
    ("sarah", "Sarah"),
    ("pavel", "Pavel"),
    ("anna", "Anna"),
    ("marie", "Marie"),
    ("tom", "Tom"),
    ("petr", "Petr"),
    ("mother", "Mother"),
    ("matka", "Matka"),
    ("máma", "Matka"),
    ("grandmother", "Grandmother"),
    ("babička", "Babička"),
    ("detective", "Detective"),
];

const LOCATION_KEYWORDS: &[(&str, &str)] = &[
    ("library", "Library"),
    ("knihovna", "Knihovna"),
    ("archive", "Archive"),
    ("archiv", "Archiv"),
    ("house", "House"),
    ("dům", "Dům"),
    ("city", "City"),
    ("město", "Město"),
    ("village", "Village"),
    ("vesnice", "Vesnice"),
    ("school", "School"),
    ("škola", "Škola"),
    ("café", "Café"),
    ("kavárna", "Kavárna"),
    ("office", "Office"),
    ("kancelář", "Kancelář"),
    ("room", "Room"),
    ("pokoj", "Pokoj"),
];

const PROP_KEYWORDS: &[(&str, &str)] = &[
    ("letter", "Letter"),
    ("dopis", "Dopis"),
    ("book", "Book"),
    ("kniha", "Kniha"),
    ("photograph", "Photograph"),
    ("fotografie", "Fotografie"),
    ("key", "Key"),
    ("klíč", "Klíč"),
    ("phone", "Phone"),
    ("telefon", "Telefon"),
    ("document", "Document"),
    ("dokument", "Dokument"),
    ("car", "Car"),
    ("auto", "Auto"),
];

fn match_keywords(text_lower: &str, table: &[(&str, &str)]) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for (keyword, name) in table {
        if contains_word(text_lower, keyword) && !found.iter().any(|f| f == name) {
            found.push((*name).to_string());
        }
    }
    found
}

/// Word-boundary match so that `"tom"` does not fire inside `"tomorrow"`.
fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Guess a genre from keywords; defaults to `"drama"`.
pub fn detect_genre(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    GENRE_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map_or(DEFAULT_GENRE, |(genre, _)| genre)
}

// ---------------------------------------------------------------------------
// Analyzer fallbacks
// ---------------------------------------------------------------------------

pub fn idea_analysis(idea: &str) -> IdeaAnalysis {
    let lower = idea.to_lowercase();
    let genre = detect_genre(idea);
    let characters = match_keywords(&lower, CHARACTER_KEYWORDS);
    let locations = match_keywords(&lower, LOCATION_KEYWORDS);
    let objects = match_keywords(&lower, PROP_KEYWORDS);

    let themes = if genre == "mystery" {
        vec!["family".to_string(), "secrets".to_string()]
    } else {
        vec!["adventure".to_string()]
    };

    let excerpt: String = idea.chars().take(100).collect();
    let protagonist = characters
        .first()
        .cloned()
        .unwrap_or_else(|| "the protagonist".to_string());

    IdeaAnalysis {
        story_assessment: StoryAssessment {
            genre: genre.to_string(),
            tone: if genre == "mystery" { "mysterious" } else { "balanced" }.to_string(),
            themes,
            ..StoryAssessment::default()
        },
        extracted_objects: ExtractedObjects {
            characters: if characters.is_empty() { vec!["Protagonist".to_string()] } else { characters },
            locations: if locations.is_empty() { vec!["Unknown location".to_string()] } else { locations.clone() },
            objects: objects.clone(),
            conflicts: vec!["Internal struggle".to_string()],
        },
        first_scene_suggestion: FirstSceneSuggestion {
            title: "The opening situation".to_string(),
            description: format!("The story begins when the protagonist... {excerpt}"),
            location: locations.first().cloned().unwrap_or_default(),
            objects: objects.into_iter().take(2).collect(),
            hook: "What happens when...".to_string(),
            conflict: "The protagonist faces an unexpected situation".to_string(),
            ..FirstSceneSuggestion::default()
        },
        project_suggestions: ProjectSuggestions {
            title: "A new story".to_string(),
            description: format!("A story about {protagonist} and their journey."),
            target_length: "15000".to_string(),
        },
        next_steps: NextSteps {
            immediate_actions: vec!["Create the project".into(), "Write the first scene".into()],
            development_areas: vec!["Characterization".into(), "World building".into()],
            potential_subplots: vec!["Supporting characters".into(), "A romantic thread".into()],
        },
    }
}

pub fn scene_objects(description: &str) -> ExtractedObjects {
    let lower = description.to_lowercase();
    ExtractedObjects {
        characters: match_keywords(&lower, CHARACTER_KEYWORDS),
        locations: match_keywords(&lower, LOCATION_KEYWORDS),
        objects: match_keywords(&lower, PROP_KEYWORDS),
        conflicts: Vec::new(),
    }
}

pub fn structure_analysis(scenes: &[SceneView]) -> StructureAnalysis {
    let mut counts: BTreeMap<String, i64> = BTreeMap::new();
    for scene in scenes {
        let kind = scene
            .scene_type
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| scene_types::DEVELOPMENT.to_string());
        *counts.entry(kind).or_insert(0) += 1;
    }

    let mut missing_elements = Vec::new();
    for (scene_type, element) in [
        (scene_types::INCITING, "inciting_incident"),
        (scene_types::CLIMAX, "climax"),
        (scene_types::RESOLUTION, "resolution"),
    ] {
        if !counts.contains_key(scene_type) {
            missing_elements.push(element.to_string());
        }
    }

    let mut recommendations = Vec::new();
    if scenes.len() < 5 {
        recommendations.push("Consider adding more scenes to develop the story fully".to_string());
    }
    if counts.get(scene_types::DEVELOPMENT).copied().unwrap_or(0) < 2 {
        recommendations.push("Add more development scenes to build tension".to_string());
    }

    StructureAnalysis {
        total_scenes: Some(scenes.len() as i64),
        continuity_score: Some(DEFAULT_CONTINUITY_SCORE),
        pacing_score: Some(DEFAULT_PACING_SCORE),
        scene_types: counts,
        missing_elements,
        recommendations,
        strengths: vec!["The basic structure is in place".to_string()],
    }
}

pub fn scene_suggestions(objects: &[ObjectView]) -> Vec<SceneSuggestion> {
    let suggestions: Vec<SceneSuggestion> = objects
        .iter()
        .filter(|o| o.status == object_status::UNUSED)
        .take(2)
        .map(|o| SceneSuggestion {
            title: format!("A scene with {}", o.name),
            description: format!("A scene that develops the role of {} in the story.", o.name),
            scene_type: scene_types::DEVELOPMENT.to_string(),
            suggested_objects: vec![o.name.clone()],
            confidence: Some(0.7),
        })
        .collect();

    if !suggestions.is_empty() {
        return suggestions;
    }

    vec![SceneSuggestion {
        title: "Character development".to_string(),
        description: "A scene focused on the protagonist's inner growth.".to_string(),
        scene_type: scene_types::DEVELOPMENT.to_string(),
        suggested_objects: Vec::new(),
        confidence: Some(0.75),
    }]
}

fn character_names(objects: &[ObjectView]) -> Vec<String> {
    let mut names: Vec<String> = objects
        .iter()
        .filter(|o| o.object_type == "character")
        .map(|o| o.name.clone())
        .collect();
    names.dedup();
    names
}

pub fn story_summary(
    project: &ProjectView,
    scenes: &[SceneView],
    objects: &[ObjectView],
) -> StorySummary {
    let characters = character_names(objects);
    let lead = characters
        .first()
        .cloned()
        .unwrap_or_else(|| "the protagonist".to_string());

    StorySummary {
        title: project.title.clone(),
        premise: format!("The story follows {lead} through {} key moments.", scenes.len()),
        theme: "The search for truth and personal growth".to_string(),
        tone: if project.genre.as_deref() == Some("mystery") { "mystery" } else { "drama" }.to_string(),
        estimated_length: (scenes.len() * 2000).to_string(),
        scene_count: scenes.len() as i64,
        object_count: objects.len() as i64,
        characters,
        ..StorySummary::default()
    }
}

/// Placeholder story used when generation fails; chapters still follow the scenes.
pub fn generated_story(
    project: &ProjectView,
    scenes: &[SceneView],
    options: &NarrativeOptions,
) -> GeneratedStory {
    let scene_ids: Vec<_> = scenes.iter().map(|s| s.id).collect();
    let chapters: Vec<GeneratedChapter> = auto_chapters(&scene_ids, "");

    GeneratedStory {
        title: project.title.clone(),
        premise: project
            .description
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| "A compelling story".to_string()),
        content: String::new(),
        word_count: Some(0),
        metadata: Some(StoryMetadata {
            genre: project.genre.clone().unwrap_or_default(),
            tone: options.tone_preference.clone(),
            ..StoryMetadata::default()
        }),
        chapters: Some(chapters),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(scene_type: Option<&str>) -> SceneView {
        SceneView {
            title: "s".into(),
            scene_type: scene_type.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn genre_detection() {
        assert_eq!(detect_genre("A coded letter hides a family secret"), "mystery");
        assert_eq!(detect_genre("Robots rebuild a city"), "sci-fi");
        assert_eq!(detect_genre("Stará babička a její tajemství"), "mystery");
        assert_eq!(detect_genre("Two brothers argue about a farm"), "drama");
    }

    #[test]
    fn keyword_matching_respects_word_boundaries() {
        assert!(contains_word("tom went home", "tom"));
        assert!(!contains_word("tomorrow never comes", "tom"));
        assert!(contains_word("v knihovna.", "knihovna"));
    }

    #[test]
    fn idea_fallback_extracts_known_names() {
        let analysis = idea_analysis("Anna finds an old letter in the library archive");
        assert_eq!(analysis.story_assessment.genre, "mystery");
        assert_eq!(analysis.story_assessment.tone, "mysterious");
        assert_eq!(analysis.extracted_objects.characters, vec!["Anna"]);
        assert_eq!(analysis.extracted_objects.locations, vec!["Library", "Archive"]);
        assert_eq!(analysis.extracted_objects.objects, vec!["Letter"]);
        assert_eq!(analysis.first_scene_suggestion.location, "Library");
        assert!(analysis.project_suggestions.description.contains("Anna"));
    }

    #[test]
    fn idea_fallback_uses_placeholders() {
        let analysis = idea_analysis("Something happens somewhere");
        assert_eq!(analysis.extracted_objects.characters, vec!["Protagonist"]);
        assert_eq!(analysis.extracted_objects.locations, vec!["Unknown location"]);
        assert_eq!(analysis.extracted_objects.conflicts, vec!["Internal struggle"]);
    }

    #[test]
    fn scene_object_fallback() {
        let objects = scene_objects("Sarah reads the letter in her room while mother waits");
        assert_eq!(objects.characters, vec!["Sarah", "Mother"]);
        assert_eq!(objects.locations, vec!["Room"]);
        assert_eq!(objects.objects, vec!["Letter"]);
    }

    #[test]
    fn structure_fallback_flags_missing_beats() {
        let scenes = vec![scene(Some("opening")), scene(None), scene(Some("climax"))];
        let analysis = structure_analysis(&scenes);
        assert_eq!(analysis.total_scenes, Some(3));
        assert_eq!(analysis.scene_types["development"], 1);
        assert_eq!(analysis.missing_elements, vec!["inciting_incident", "resolution"]);
        assert_eq!(analysis.recommendations.len(), 2);
        assert_eq!(analysis.continuity_score, Some(0.75));
    }

    #[test]
    fn structure_fallback_complete_story_has_no_recommendations() {
        let scenes = vec![
            scene(Some("inciting")),
            scene(Some("development")),
            scene(Some("development")),
            scene(Some("climax")),
            scene(Some("resolution")),
        ];
        let analysis = structure_analysis(&scenes);
        assert!(analysis.missing_elements.is_empty());
        assert!(analysis.recommendations.is_empty());
    }

    #[test]
    fn suggestions_prefer_unused_objects() {
        let objects = vec![
            ObjectView { name: "Key".into(), status: "unused".into(), ..Default::default() },
            ObjectView { name: "Map".into(), status: "unused".into(), ..Default::default() },
            ObjectView { name: "Coin".into(), status: "unused".into(), ..Default::default() },
        ];
        let suggestions = scene_suggestions(&objects);
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].suggested_objects, vec!["Key"]);

        let generic = scene_suggestions(&[]);
        assert_eq!(generic.len(), 1);
        assert_eq!(generic[0].confidence, Some(0.75));
    }

    #[test]
    fn fallback_story_has_chapters() {
        let project = ProjectView { title: "T".into(), ..Default::default() };
        let scenes: Vec<SceneView> = (1..=6).map(|id| SceneView { id, ..Default::default() }).collect();
        let story = generated_story(&project, &scenes, &NarrativeOptions::default());
        assert_eq!(story.premise, "A compelling story");
        assert_eq!(story.metadata.unwrap().tone, "dramatic");
        let chapters = story.chapters.unwrap();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[1].scenes, vec![4, 5, 6]);
    }
}
