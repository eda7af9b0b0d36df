//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts
//! - A `Deserialize` update DTO (all `Option` fields) for patches

pub mod activity;
pub mod billing;
pub mod collaboration;
pub mod project;
pub mod scene;
pub mod session;
pub mod story;
pub mod story_object;
pub mod token_usage;
pub mod user;
