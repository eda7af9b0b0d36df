//! Text completion for the story analyzer and critics.
//!
//! - [`CompletionProvider`]: the seam every backend implements.
//! - [`AnthropicProvider`]: HTTP client for the Anthropic Messages API.
//! - [`SimulatedProvider`]: canned offline replies for development and tests.
//! - [`LlmClient`]: what the API layer holds; applies the rate limit and
//!   prompt-size guard before delegating to a provider.

pub mod anthropic;
pub mod client;
pub mod config;
pub mod error;
pub mod provider;
pub mod rate_limit;
pub mod simulation;

pub use anthropic::AnthropicProvider;
pub use client::{LlmClient, LlmStatus};
pub use config::LlmConfig;
pub use error::LlmError;
pub use provider::{Completion, CompletionProvider};
pub use simulation::SimulatedProvider;
