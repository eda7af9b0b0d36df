//! Story vocabulary shared by the API, repositories and AI prompts:
//! object kinds, scene types, project phases and their validation.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Story objects
// ---------------------------------------------------------------------------

/// The four kinds of story object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Character,
    Location,
    Prop,
    Conflict,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 4] = [
        Self::Character,
        Self::Location,
        Self::Prop,
        Self::Conflict,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::Location => "location",
            Self::Prop => "prop",
            Self::Conflict => "conflict",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == value)
    }

    /// Map an LLM extraction category (`"characters"`, `"objects"`, ...) onto a kind.
    pub fn from_category(category: &str) -> Option<Self> {
        match category.trim().to_lowercase().as_str() {
            "character" | "characters" => Some(Self::Character),
            "location" | "locations" => Some(Self::Location),
            "prop" | "props" | "object" | "objects" => Some(Self::Prop),
            "conflict" | "conflicts" => Some(Self::Conflict),
            _ => None,
        }
    }

    /// How strongly an auto-linked object of this kind features in a scene.
    pub fn default_significance(self) -> &'static str {
        match self {
            Self::Character => significance::MAIN,
            _ => significance::SUPPORTING,
        }
    }
}

/// Object importance levels.
pub const VALID_IMPORTANCE: &[&str] = &["low", "medium", "high", "critical"];

/// Default importance for new objects.
pub const DEFAULT_IMPORTANCE: &str = "medium";

/// Object lifecycle states.
pub mod object_status {
    pub const ACTIVE: &str = "active";
    /// Created by analysis but not yet linked to any scene.
    pub const UNUSED: &str = "unused";
    pub const RESOLVED: &str = "resolved";
}

pub const VALID_OBJECT_STATUSES: &[&str] = &[
    object_status::ACTIVE,
    object_status::UNUSED,
    object_status::RESOLVED,
];

/// How much a linked object matters within one scene.
pub mod significance {
    pub const MAIN: &str = "main";
    pub const SUPPORTING: &str = "supporting";
    pub const BACKGROUND: &str = "background";
}

pub const VALID_SIGNIFICANCE: &[&str] = &[
    significance::MAIN,
    significance::SUPPORTING,
    significance::BACKGROUND,
];

// ---------------------------------------------------------------------------
// Scenes
// ---------------------------------------------------------------------------

pub mod scene_types {
    pub const OPENING: &str = "opening";
    pub const INCITING: &str = "inciting";
    pub const DEVELOPMENT: &str = "development";
    pub const RISING_ACTION: &str = "rising_action";
    pub const CLIMAX: &str = "climax";
    pub const FALLING_ACTION: &str = "falling_action";
    pub const RESOLUTION: &str = "resolution";
}

pub const VALID_SCENE_TYPES: &[&str] = &[
    scene_types::OPENING,
    scene_types::INCITING,
    scene_types::DEVELOPMENT,
    scene_types::RISING_ACTION,
    scene_types::CLIMAX,
    scene_types::FALLING_ACTION,
    scene_types::RESOLUTION,
];

/// Scene type assumed when none is given.
pub const DEFAULT_SCENE_TYPE: &str = scene_types::DEVELOPMENT;

/// Default emotional intensity for new scenes.
pub const DEFAULT_EMOTIONAL_INTENSITY: f64 = 0.5;

/// Clamp an emotional intensity into `[0, 1]`. NaN becomes the default.
pub fn clamp_intensity(value: f64) -> f64 {
    if value.is_nan() {
        DEFAULT_EMOTIONAL_INTENSITY
    } else {
        value.clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

pub mod phases {
    pub const IDEA: &str = "idea";
    pub const EXPAND: &str = "expand";
    pub const STORY: &str = "story";
}

pub const VALID_PHASES: &[&str] = &[phases::IDEA, phases::EXPAND, phases::STORY];

/// Default target length for new projects, in words.
pub const DEFAULT_TARGET_WORD_COUNT: i32 = 50_000;

/// Marketability scale bounds.
pub const MIN_MARKETABILITY: i32 = 1;
pub const MAX_MARKETABILITY: i32 = 5;

/// Minimum length of a story idea submitted for analysis.
pub const MIN_IDEA_LENGTH: u64 = 10;

/// Minimum number of scenes before a full story can be generated.
pub const MIN_SCENES_FOR_STORY: usize = 2;

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Check `value` against `allowed`, naming `field` in the error message.
pub fn validate_one_of(field: &str, value: &str, allowed: &[&str]) -> Result<(), String> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(format!(
            "Invalid {field} '{value}'. Must be one of: {}",
            allowed.join(", ")
        ))
    }
}

/// Trim an extracted object name. Blank names are dropped.
pub fn normalize_object_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_keys_map_to_kinds() {
        assert_eq!(ObjectKind::from_category("characters"), Some(ObjectKind::Character));
        assert_eq!(ObjectKind::from_category("Locations"), Some(ObjectKind::Location));
        assert_eq!(ObjectKind::from_category("objects"), Some(ObjectKind::Prop));
        assert_eq!(ObjectKind::from_category("props"), Some(ObjectKind::Prop));
        assert_eq!(ObjectKind::from_category("conflicts"), Some(ObjectKind::Conflict));
        assert_eq!(ObjectKind::from_category("themes"), None);
    }

    #[test]
    fn kind_parse_is_exact() {
        assert_eq!(ObjectKind::parse("prop"), Some(ObjectKind::Prop));
        assert_eq!(ObjectKind::parse("Prop"), None);
    }

    #[test]
    fn characters_link_as_main() {
        assert_eq!(ObjectKind::Character.default_significance(), "main");
        assert_eq!(ObjectKind::Location.default_significance(), "supporting");
    }

    #[test]
    fn intensity_is_clamped() {
        assert_eq!(clamp_intensity(1.7), 1.0);
        assert_eq!(clamp_intensity(-0.2), 0.0);
        assert_eq!(clamp_intensity(0.3), 0.3);
        assert_eq!(clamp_intensity(f64::NAN), 0.5);
    }

    #[test]
    fn one_of_validation() {
        assert!(validate_one_of("scene_type", "climax", VALID_SCENE_TYPES).is_ok());
        let err = validate_one_of("scene_type", "finale", VALID_SCENE_TYPES).unwrap_err();
        assert!(err.contains("finale"));
        assert!(err.contains("opening"));
    }

    #[test]
    fn object_names_are_trimmed() {
        assert_eq!(normalize_object_name("  Anna "), Some("Anna".to_string()));
        assert_eq!(normalize_object_name("   "), None);
    }
}
