//! The three critic personas and their offline fallback verdicts.

use serde::Serialize;

use crate::ai_response::{parse_object, Critique};
use crate::prompts::ObjectView;
use crate::story::object_status;

/// A critic persona. Each reviews one aspect of the story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Critic {
    /// Structure and pacing.
    ProfessorSyntax,
    /// Characterization.
    CharacterWhisperer,
    /// How story objects are used across scenes.
    ObjectFlowAnalyzer,
}

impl Critic {
    pub const ALL: [Critic; 3] = [
        Self::ProfessorSyntax,
        Self::CharacterWhisperer,
        Self::ObjectFlowAnalyzer,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            Self::ProfessorSyntax => "Professor Syntax",
            Self::CharacterWhisperer => "Character Whisperer",
            Self::ObjectFlowAnalyzer => "Object Flow Analyzer",
        }
    }

    /// Key used for this critic in the combined critics response.
    pub fn key(self) -> &'static str {
        match self {
            Self::ProfessorSyntax => "structure",
            Self::CharacterWhisperer => "characters",
            Self::ObjectFlowAnalyzer => "object_flow",
        }
    }

    /// Score assumed when the model omits one.
    pub fn fallback_score(self) -> f64 {
        match self {
            Self::ProfessorSyntax => 4.0,
            Self::CharacterWhisperer => 4.5,
            Self::ObjectFlowAnalyzer => 3.8,
        }
    }
}

/// Parse a critic's reply. The critic name is always forced and a missing
/// score takes the persona's fallback. Unparseable replies become a neutral
/// verdict.
pub fn parse_critique(critic: Critic, text: &str) -> Critique {
    let mut critique = parse_object::<Critique>(text).unwrap_or_else(|_| Critique {
        main_feedback: "Analysis complete.".to_string(),
        recommendations: vec!["Keep working on the story".to_string()],
        ..Critique::default()
    });
    critique.critic_name = critic.display_name().to_string();
    critique.score.get_or_insert(critic.fallback_score());
    critique
}

// ---------------------------------------------------------------------------
// Offline verdicts
// ---------------------------------------------------------------------------

pub fn fallback_structure(scene_count: usize) -> Critique {
    let (score, recommendation) = if scene_count < 3 {
        (3.0, "Add more scenes for a fuller structure")
    } else if scene_count < 5 {
        (3.5, "Consider adding more development scenes")
    } else {
        (4.0, "The structure looks solid")
    };

    Critique {
        critic_name: Critic::ProfessorSyntax.display_name().to_string(),
        score: Some(score),
        main_feedback: format!(
            "The story has {scene_count} scenes. The basic structure is recognizable."
        ),
        recommendations: vec![recommendation.to_string()],
        ..Critique::default()
    }
}

pub fn fallback_characters(characters: &[ObjectView]) -> Critique {
    let count = characters.len();
    let score = (count as f64).clamp(2.0, 4.5);
    let lead = characters.first().map_or("The protagonist", |c| c.name.as_str());
    let recommendation = if count < 3 {
        "Develop the supporting cast further"
    } else {
        "The characters are well designed"
    };

    Critique {
        critic_name: Critic::CharacterWhisperer.display_name().to_string(),
        score: Some(score),
        main_feedback: format!("The story has {count} main characters. {lead} is well motivated."),
        recommendations: vec![recommendation.to_string()],
        ..Critique::default()
    }
}

pub fn fallback_object_flow(objects: &[ObjectView]) -> Critique {
    let unused = objects
        .iter()
        .filter(|o| o.status == object_status::UNUSED)
        .count();
    let score = (5.0 - unused as f64 * 0.5).max(2.0);
    let recommendation = if unused > 0 {
        "Bring the unused objects into play"
    } else {
        "Objects are used well"
    };

    Critique {
        critic_name: Critic::ObjectFlowAnalyzer.display_name().to_string(),
        score: Some(score),
        main_feedback: format!("You have {} objects, {unused} unused.", objects.len()),
        recommendations: vec![recommendation.to_string()],
        ..Critique::default()
    }
}

/// Mean of the critics' scores, rounded to one decimal.
pub fn overall_score(critiques: &[Critique]) -> Option<f64> {
    let scores: Vec<f64> = critiques.iter().filter_map(|c| c.score).collect();
    if scores.is_empty() {
        return None;
    }
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    Some((mean * 10.0).round() / 10.0)
}
