//! Request extractors that establish who is calling and what they may touch.
//!
//! [`auth`] resolves the caller from the access token; [`project_access`]
//! resolves the caller's role on a single project.

pub mod auth;
pub mod project_access;
