use async_trait::async_trait;
use serde::Serialize;
use storyforge_core::prompts::Prompt;

use crate::error::LlmError;

/// A finished completion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Completion {
    pub text: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub model: String,
}

/// A text-completion backend.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<Completion, LlmError>;

    /// Model identifier reported in status output and usage logs.
    fn model(&self) -> &str;
}
