/// Completion backend settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Serve canned replies instead of calling the API. Forced on when no
    /// API key is configured.
    pub simulation_mode: bool,
    pub max_requests_per_minute: u32,
    /// Upper bound on estimated prompt tokens (system plus user message).
    pub max_tokens_per_request: i64,
    pub request_timeout_secs: u64,
}

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.into(),
            model: DEFAULT_MODEL.into(),
            simulation_mode: true,
            max_requests_per_minute: 50,
            max_tokens_per_request: 4000,
            request_timeout_secs: 120,
        }
    }
}

impl LlmConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default                      |
    /// |----------------------------------|------------------------------|
    /// | `ANTHROPIC_API_KEY`              | (none, forces simulation)    |
    /// | `ANTHROPIC_BASE_URL`             | `https://api.anthropic.com`  |
    /// | `DEFAULT_CLAUDE_MODEL`           | `claude-3-5-sonnet-20241022` |
    /// | `AI_SIMULATION_MODE`             | `false`                      |
    /// | `CLAUDE_MAX_REQUESTS_PER_MINUTE` | `50`                         |
    /// | `CLAUDE_MAX_TOKENS_PER_REQUEST`  | `4000`                       |
    /// | `CLAUDE_REQUEST_TIMEOUT_SECS`    | `120`                        |
    pub fn from_env() -> Self {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        let base_url =
            std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());

        let model = std::env::var("DEFAULT_CLAUDE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());

        let requested_simulation = std::env::var("AI_SIMULATION_MODE")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let max_requests_per_minute: u32 = std::env::var("CLAUDE_MAX_REQUESTS_PER_MINUTE")
            .unwrap_or_else(|_| "50".into())
            .parse()
            .expect("CLAUDE_MAX_REQUESTS_PER_MINUTE must be a valid u32");

        let max_tokens_per_request: i64 = std::env::var("CLAUDE_MAX_TOKENS_PER_REQUEST")
            .unwrap_or_else(|_| "4000".into())
            .parse()
            .expect("CLAUDE_MAX_TOKENS_PER_REQUEST must be a valid i64");

        let request_timeout_secs: u64 = std::env::var("CLAUDE_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".into())
            .parse()
            .expect("CLAUDE_REQUEST_TIMEOUT_SECS must be a valid u64");

        let simulation_mode = requested_simulation || api_key.is_none();

        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            simulation_mode,
            max_requests_per_minute,
            max_tokens_per_request,
            request_timeout_secs,
        }
    }
}
