//! Offline completion backend.
//!
//! Replies are chosen by looking for the persona named in the system
//! prompt. Anything unrecognised gets a short plain-text echo, which the
//! response parsers reject, so callers fall through to their heuristics.

use async_trait::async_trait;
use storyforge_core::prompts::Prompt;
use storyforge_core::tokens::estimate_input_tokens;

use crate::error::LlmError;
use crate::provider::{Completion, CompletionProvider};

pub const SIMULATION_MODEL: &str = "simulation";

/// Persona marker in the system prompt and the reply served for it. Order
/// matters: the chapter reviser is checked before the full-story novelist.
const CANNED: &[(&str, &str)] = &[
    ("development editor", IDEA_ANALYSIS),
    ("extract story elements", SCENE_OBJECTS),
    ("dramaturg", STRUCTURE),
    ("story consultant", SUGGESTIONS),
    ("literary analyst", SUMMARY),
    ("Professor Syntax", CRITIQUE_STRUCTURE),
    ("Character Whisperer", CRITIQUE_CHARACTERS),
    ("Object Flow Analyzer", CRITIQUE_OBJECTS),
    ("revising a single chapter", CHAPTER),
    ("novelist", STORY),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedProvider;

impl SimulatedProvider {
    pub fn reply_for(prompt: &Prompt) -> String {
        CANNED
            .iter()
            .find(|(marker, _)| prompt.system.contains(marker))
            .map(|(_, reply)| reply.trim().to_string())
            .unwrap_or_else(|| {
                let preview: String = prompt.user.chars().take(100).collect();
                format!("Simulated reply for prompt: {preview}...")
            })
    }
}

#[async_trait]
impl CompletionProvider for SimulatedProvider {
    async fn complete(&self, prompt: &Prompt) -> Result<Completion, LlmError> {
        let text = Self::reply_for(prompt);
        let input_tokens = estimate_input_tokens(&format!("{}\n\n{}", prompt.system, prompt.user));
        let output_tokens = estimate_input_tokens(&text);
        Ok(Completion {
            text,
            input_tokens,
            output_tokens,
            model: SIMULATION_MODEL.to_string(),
        })
    }

    fn model(&self) -> &str {
        SIMULATION_MODEL
    }
}

// ---------------------------------------------------------------------------
// Canned replies
// ---------------------------------------------------------------------------

const IDEA_ANALYSIS: &str = r#"
{
  "story_assessment": {
    "genre": "mystery",
    "tone": "melancholic",
    "target_audience": "adult readers",
    "estimated_scope": "novella",
    "themes": ["family legacy", "the weight of truth"],
    "marketability": 4
  },
  "extracted_objects": {
    "characters": ["Sarah", "Grandmother Anna"],
    "locations": ["The attic"],
    "objects": ["Coded letter"],
    "conflicts": ["Uncovering a buried secret"]
  },
  "first_scene_suggestion": {
    "title": "The letter in the attic",
    "description": "Sarah clears out her grandmother's attic and finds a letter written in cipher.",
    "scene_type": "opening",
    "location": "The attic",
    "objects": ["Coded letter"],
    "hook": "The letter is addressed to Sarah, dated forty years before her birth.",
    "conflict": "Curiosity against loyalty to the family's silence"
  },
  "project_suggestions": {
    "title": "Anna's Secret",
    "description": "A young woman decodes her grandmother's wartime letters.",
    "target_length": "15000"
  },
  "next_steps": {
    "immediate_actions": ["Outline the decoding of the first letter"],
    "development_areas": ["Anna's life during the war"],
    "potential_subplots": ["A historian who knew Anna"]
  }
}
"#;

const SCENE_OBJECTS: &str = r#"
{
  "characters": ["Sarah", "Pavel"],
  "locations": ["The library"],
  "objects": ["Coded letter", "Historical records"],
  "conflicts": ["Uncovering the truth"]
}
"#;

const STRUCTURE: &str = r#"
{
  "continuity_score": 0.85,
  "pacing_score": 0.72,
  "scene_types": {"inciting": 1, "development": 1},
  "missing_elements": ["climax", "resolution"],
  "recommendations": [
    "Add a climax scene at the peak of tension",
    "Write a resolution that closes the story"
  ],
  "strengths": ["Strong characterization of the lead", "Good use of objects"]
}
"#;

const SUGGESTIONS: &str = r#"
[
  {
    "title": "Confronting the truth",
    "description": "Sarah confronts her mother with what she has learned about Anna.",
    "scene_type": "development",
    "suggested_objects": ["Family photographs"],
    "confidence": 0.9
  },
  {
    "title": "The war archive",
    "description": "Pavel and Sarah visit the archive to verify Anna's identity.",
    "scene_type": "rising_action",
    "suggested_objects": ["Archive documents"],
    "confidence": 0.85
  }
]
"#;

const SUMMARY: &str = r#"
{
  "title": "Anna's Secret",
  "premise": "A young woman uncovers her grandmother's wartime secret through coded letters.",
  "theme": "Family legacy and the power of truth",
  "protagonist": "Sarah, who moves from ignorance to understanding",
  "antagonist": "The family's silence",
  "central_conflict": "Revealing a painful truth against protecting the family's peace",
  "story_arc": "Discovery, search, revelation, acceptance",
  "key_symbols": ["The coded letter"],
  "tone": "Mystery with emotional undertones",
  "target_audience": "Adult readers of mystery and drama",
  "estimated_length": "15000 words",
  "marketability": "4",
  "unique_elements": ["Letters decoded chapter by chapter"]
}
"#;

const CRITIQUE_STRUCTURE: &str = r#"
{
  "score": 4.0,
  "main_feedback": "The inciting incident lands early and the rising action is clear.",
  "strengths": ["Clear inciting incident"],
  "weaknesses": ["The climax is not yet written"],
  "recommendations": ["Add a climax that forces Sarah to choose"],
  "act_balance": "front-loaded"
}
"#;

const CRITIQUE_CHARACTERS: &str = r#"
{
  "score": 4.5,
  "main_feedback": "Sarah is well motivated; Pavel needs a want of his own.",
  "strengths": ["Sarah's curiosity drives every scene"],
  "weaknesses": ["Pavel is reactive"],
  "recommendations": ["Give Pavel a personal stake in the archive"]
}
"#;

const CRITIQUE_OBJECTS: &str = r#"
{
  "score": 3.8,
  "main_feedback": "The coded letter is a strong through-line; other objects appear once.",
  "strengths": ["The letter recurs with rising significance"],
  "weaknesses": ["Several props are introduced and dropped"],
  "recommendations": ["Pay off the family photographs in the final act"]
}
"#;

const STORY: &str = r#"
{
  "title": "Anna's Secret",
  "premise": "A young woman uncovers her grandmother's wartime secret through coded letters.",
  "content": "Sarah found the letter on a rainy afternoon. The attic smelled of dust and lavender. The handwriting was her grandmother's, but the words made no sense. Pavel recognised the cipher at once. Together they opened the archive boxes. Anna had not been who anyone thought. By spring Sarah understood why her grandmother had stayed silent.",
  "metadata": {
    "genre": "mystery",
    "theme": "family legacy",
    "targetAudience": "adult readers",
    "tone": "melancholic",
    "uniqueElements": ["coded letters"],
    "keySymbols": ["the letter"]
  }
}
"#;

const CHAPTER: &str = r#"
{
  "title": "The Letter",
  "content": "The rain had not stopped for three days when Sarah climbed into the attic. Among the hatboxes she found an envelope addressed in her grandmother's hand."
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use storyforge_core::ai_response::{
        parse_object, parse_scene_suggestions, parse_structure_analysis, ExtractedObjects,
        GeneratedStory, IdeaAnalysis, RegeneratedChapter, StorySummary,
    };
    use storyforge_core::critics::{parse_critique, Critic};
    use storyforge_core::prompts::{self, NarrativeOptions, ProjectView};

    fn project() -> ProjectView {
        ProjectView {
            title: "Anna".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn idea_reply_parses() {
        let completion = SimulatedProvider
            .complete(&prompts::idea_analysis("A grandmother's letters", None))
            .await
            .unwrap();
        let analysis: IdeaAnalysis = parse_object(&completion.text).unwrap();
        assert_eq!(analysis.story_assessment.genre, "mystery");
        assert_eq!(analysis.extracted_objects.characters.len(), 2);
        assert_eq!(completion.model, SIMULATION_MODEL);
        assert!(completion.input_tokens > 0);
    }

    #[test]
    fn scene_object_reply_parses() {
        let text = SimulatedProvider::reply_for(&prompts::scene_objects("Sarah reads", "Anna"));
        let objects: ExtractedObjects = parse_object(&text).unwrap();
        assert_eq!(objects.locations, vec!["The library"]);
    }

    #[test]
    fn structure_and_suggestions_parse() {
        let text = SimulatedProvider::reply_for(&prompts::structure_analysis(&project(), &[]));
        let analysis = parse_structure_analysis(&text, 2).unwrap();
        assert_eq!(analysis.total_scenes, Some(2));
        assert_eq!(analysis.pacing_score, Some(0.72));

        let text = SimulatedProvider::reply_for(&prompts::next_scenes(&project(), &[], &[]));
        assert_eq!(parse_scene_suggestions(&text).unwrap().len(), 2);
    }

    #[test]
    fn summary_reply_parses() {
        let text = SimulatedProvider::reply_for(&prompts::story_summary(&project(), &[], &[]));
        let summary: StorySummary = parse_object(&text).unwrap();
        assert_eq!(summary.title, "Anna's Secret");
    }

    #[test]
    fn each_critic_gets_its_own_reply() {
        let text = SimulatedProvider::reply_for(&prompts::character_critique(&project(), &[], &[]));
        let critique = parse_critique(Critic::CharacterWhisperer, &text);
        assert_eq!(critique.score, Some(4.5));
        assert!(critique.main_feedback.starts_with("Sarah is well motivated"));

        let text = SimulatedProvider::reply_for(&prompts::structure_critique(&project(), &[]));
        let critique = parse_critique(Critic::ProfessorSyntax, &text);
        assert_eq!(critique.extra["act_balance"], "front-loaded");
    }

    #[test]
    fn story_and_chapter_replies_are_distinct() {
        let options = NarrativeOptions::default();
        let story = SimulatedProvider::reply_for(&prompts::full_story(&project(), &[], &[], &options));
        let story: GeneratedStory = parse_object(&story).unwrap();
        assert!(story.content.starts_with("Sarah found the letter"));
        assert!(story.chapters.is_none());

        let chapter = SimulatedProvider::reply_for(&prompts::chapter_rewrite(
            &project(),
            "Chapter 1",
            &[],
            &options,
        ));
        let chapter: RegeneratedChapter = parse_object(&chapter).unwrap();
        assert_eq!(chapter.title, "The Letter");
    }

    #[test]
    fn unknown_prompt_gets_an_echo() {
        let prompt = Prompt {
            system: "You are a poet.".into(),
            user: "Write a haiku".into(),
            max_tokens: 50,
        };
        let text = SimulatedProvider::reply_for(&prompt);
        assert_eq!(text, "Simulated reply for prompt: Write a haiku...");
    }
}
