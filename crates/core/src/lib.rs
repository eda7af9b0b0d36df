//! Domain logic shared by every StoryForge crate. Pure functions and types;
//! no I/O.

pub mod ai_response;
pub mod billing;
pub mod chapters;
pub mod collaboration;
pub mod critics;
pub mod error;
pub mod export;
pub mod heuristics;
pub mod prompts;
pub mod roles;
pub mod story;
pub mod tokens;
pub mod types;
