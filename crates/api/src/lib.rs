//! StoryForge API server library.
//!
//! Exposes the building blocks (config, state, error handling, routes,
//! WebSocket collaboration, AI orchestration) so integration tests and the
//! binary entrypoint can both access them.

pub mod ai;
pub mod auth;
pub mod background;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod query;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
