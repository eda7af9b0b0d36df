/// Errors from the completion layer.
///
/// Callers treat every variant as "no usable model output" and fall back to
/// local heuristics; the distinction matters for logging.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned a non-2xx status code.
    #[error("LLM API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The provider answered 2xx but without any text content.
    #[error("Empty response from LLM API")]
    EmptyResponse,

    #[error("Rate limit exceeded: {0} requests per minute")]
    RateLimited(u32),

    #[error("Prompt too long: {tokens} tokens (max: {max})")]
    PromptTooLong { tokens: i64, max: i64 },
}
