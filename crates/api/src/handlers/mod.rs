//! Request handlers, one submodule per resource.
//!
//! Handlers check project access through
//! [`require_project`](crate::middleware::project_access::require_project),
//! delegate persistence to the repositories in `storyforge_db` and map errors
//! via [`AppError`](crate::error::AppError). AI operations go through
//! [`Meter`](crate::ai::Meter) so every charge follows the same
//! quote-then-settle path.

pub mod admin;
pub mod ai;
pub mod auth;
pub mod billing;
pub mod collaboration;
pub mod comment;
pub mod project;
pub mod scene;
pub mod story;
pub mod story_object;
