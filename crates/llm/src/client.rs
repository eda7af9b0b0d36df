use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use storyforge_core::prompts::Prompt;
use storyforge_core::tokens::estimate_input_tokens;

use crate::anthropic::AnthropicProvider;
use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::provider::{Completion, CompletionProvider};
use crate::rate_limit::RateLimiter;
use crate::simulation::SimulatedProvider;

/// Reported by `GET /ai/status`.
#[derive(Debug, Clone, Serialize)]
pub struct LlmStatus {
    /// `"simulation"` or `"live"`.
    pub mode: &'static str,
    pub model: String,
    pub api_key_present: bool,
    pub max_requests_per_minute: u32,
    pub max_tokens_per_request: i64,
    pub requests_in_window: usize,
}

/// Shared completion entry point.
///
/// Every call passes the rate limiter and the prompt-size guard before it
/// reaches the provider. Errors are returned to the caller, which decides
/// on a fallback.
pub struct LlmClient {
    provider: Arc<dyn CompletionProvider>,
    limiter: RateLimiter,
    max_tokens_per_request: i64,
    simulation: bool,
    api_key_present: bool,
}

impl LlmClient {
    pub fn from_config(config: &LlmConfig) -> Self {
        let (provider, simulation): (Arc<dyn CompletionProvider>, bool) =
            match (&config.api_key, config.simulation_mode) {
                (Some(key), false) => (
                    Arc::new(AnthropicProvider::new(
                        config.base_url.clone(),
                        key.clone(),
                        config.model.clone(),
                        Duration::from_secs(config.request_timeout_secs),
                    )),
                    false,
                ),
                _ => (Arc::new(SimulatedProvider), true),
            };

        tracing::info!(
            mode = if simulation { "simulation" } else { "live" },
            model = provider.model(),
            "LLM client initialised"
        );

        Self {
            provider,
            limiter: RateLimiter::new(config.max_requests_per_minute),
            max_tokens_per_request: config.max_tokens_per_request,
            simulation,
            api_key_present: config.api_key.is_some(),
        }
    }

    /// Wrap an arbitrary provider. Used by tests to inject failures.
    pub fn with_provider(
        provider: Arc<dyn CompletionProvider>,
        max_requests_per_minute: u32,
        max_tokens_per_request: i64,
    ) -> Self {
        Self {
            provider,
            limiter: RateLimiter::new(max_requests_per_minute),
            max_tokens_per_request,
            simulation: false,
            api_key_present: false,
        }
    }

    pub fn simulated() -> Self {
        Self::from_config(&LlmConfig::default())
    }

    pub async fn complete(&self, prompt: &Prompt) -> Result<Completion, LlmError> {
        let prompt_tokens = estimate_input_tokens(&format!("{}\n\n{}", prompt.system, prompt.user));
        if prompt_tokens > self.max_tokens_per_request {
            return Err(LlmError::PromptTooLong {
                tokens: prompt_tokens,
                max: self.max_tokens_per_request,
            });
        }

        if !self.limiter.try_acquire() {
            return Err(LlmError::RateLimited(self.limiter.max_per_minute()));
        }

        let started = Instant::now();
        let result = self.provider.complete(prompt).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(completion) => tracing::debug!(
                model = %completion.model,
                input_tokens = completion.input_tokens,
                output_tokens = completion.output_tokens,
                elapsed_ms,
                "Completion finished"
            ),
            Err(e) => tracing::warn!(error = %e, elapsed_ms, "Completion failed"),
        }
        result
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    pub fn is_simulation(&self) -> bool {
        self.simulation
    }

    pub fn status(&self) -> LlmStatus {
        LlmStatus {
            mode: if self.simulation { "simulation" } else { "live" },
            model: self.provider.model().to_string(),
            api_key_present: self.api_key_present,
            max_requests_per_minute: self.limiter.max_per_minute(),
            max_tokens_per_request: self.max_tokens_per_request,
            requests_in_window: self.limiter.in_window(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;

    struct Failing;

    #[async_trait]
    impl CompletionProvider for Failing {
        async fn complete(&self, _prompt: &Prompt) -> Result<Completion, LlmError> {
            Err(LlmError::Api {
                status: 529,
                body: "overloaded".into(),
            })
        }

        fn model(&self) -> &str {
            "failing"
        }
    }

    fn prompt(words: usize) -> Prompt {
        Prompt {
            system: "You are a poet.".into(),
            user: vec!["word"; words].join(" "),
            max_tokens: 10,
        }
    }

    #[test]
    fn missing_key_forces_simulation() {
        let config = LlmConfig {
            api_key: None,
            simulation_mode: false,
            ..LlmConfig::default()
        };
        let client = LlmClient::from_config(&config);
        assert!(client.is_simulation());
        assert_eq!(client.status().mode, "simulation");
        assert_eq!(client.model(), "simulation");
    }

    #[test]
    fn key_without_simulation_is_live() {
        let config = LlmConfig {
            api_key: Some("sk-test".into()),
            simulation_mode: false,
            ..LlmConfig::default()
        };
        let client = LlmClient::from_config(&config);
        let status = client.status();
        assert_eq!(status.mode, "live");
        assert!(status.api_key_present);
        assert_eq!(status.model, crate::config::DEFAULT_MODEL);
    }

    #[tokio::test]
    async fn oversized_prompt_is_refused_before_the_provider() {
        let client = LlmClient::with_provider(Arc::new(SimulatedProvider), 10, 100);
        // 4 system words + 100 user words = 135 estimated tokens.
        let result = client.complete(&prompt(100)).await;
        assert_matches!(result, Err(LlmError::PromptTooLong { tokens: 135, max: 100 }));
        assert_eq!(client.status().requests_in_window, 0);
    }

    #[tokio::test]
    async fn rate_limit_applies_per_client() {
        let client = LlmClient::with_provider(Arc::new(SimulatedProvider), 2, 4000);
        assert!(client.complete(&prompt(3)).await.is_ok());
        assert!(client.complete(&prompt(3)).await.is_ok());
        assert_matches!(client.complete(&prompt(3)).await, Err(LlmError::RateLimited(2)));
    }

    #[tokio::test]
    async fn provider_errors_pass_through() {
        let client = LlmClient::with_provider(Arc::new(Failing), 10, 4000);
        assert_matches!(
            client.complete(&prompt(3)).await,
            Err(LlmError::Api { status: 529, .. })
        );
    }
}
