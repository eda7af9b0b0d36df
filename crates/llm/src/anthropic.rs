//! Client for the Anthropic Messages API.
//!
//! Sends `POST {base_url}/v1/messages` with the system prompt, a single user
//! message and the prompt's completion budget.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use storyforge_core::prompts::Prompt;

use crate::error::LlmError;
use crate::provider::{Completion, CompletionProvider};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const TEMPERATURE: f64 = 0.7;

pub struct AnthropicProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    model: Option<String>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: i64,
    output_tokens: i64,
}

impl AnthropicProvider {
    pub fn new(base_url: String, api_key: String, model: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self::with_client(client, base_url, api_key, model)
    }

    /// Reuse an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        base_url: String,
        api_key: String,
        model: String,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    async fn complete(&self, prompt: &Prompt) -> Result<Completion, LlmError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: prompt.max_tokens,
            temperature: TEMPERATURE,
            system: &prompt.system,
            messages: [Message {
                role: "user",
                content: &prompt.user,
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let parsed: MessagesResponse = Self::ensure_success(response).await?.json().await?;
        into_completion(parsed, &self.model)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn into_completion(response: MessagesResponse, model: &str) -> Result<Completion, LlmError> {
    let text: String = response
        .content
        .iter()
        .filter(|b| b.kind == "text")
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join("");
    if text.trim().is_empty() {
        return Err(LlmError::EmptyResponse);
    }

    let (input_tokens, output_tokens) = response
        .usage
        .map_or((0, 0), |u| (u.input_tokens, u.output_tokens));

    Ok(Completion {
        text,
        input_tokens,
        output_tokens,
        model: response.model.unwrap_or_else(|| model.to_string()),
    })
}
