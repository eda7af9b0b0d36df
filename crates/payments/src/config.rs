pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Publishable key handed to the frontend when no real gateway is used.
pub const SIMULATION_PUBLISHABLE_KEY: &str = "pk_test_simulation_mode";

/// Payment gateway settings.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub secret_key: Option<String>,
    pub publishable_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub api_base: String,
    /// Forced on when no secret key is configured.
    pub simulation_mode: bool,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            publishable_key: None,
            webhook_secret: None,
            api_base: DEFAULT_STRIPE_API_BASE.into(),
            simulation_mode: true,
        }
    }
}

impl PaymentConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                   | Default                  |
    /// |---------------------------|--------------------------|
    /// | `STRIPE_SECRET_KEY`       | (none, forces simulation)|
    /// | `STRIPE_PUBLISHABLE_KEY`  | (none)                   |
    /// | `STRIPE_WEBHOOK_SECRET`   | (none)                   |
    /// | `STRIPE_API_BASE`         | `https://api.stripe.com` |
    /// | `PAYMENT_SIMULATION_MODE` | `false`                  |
    pub fn from_env() -> Self {
        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let secret_key = non_empty("STRIPE_SECRET_KEY");
        let requested_simulation = std::env::var("PAYMENT_SIMULATION_MODE")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            simulation_mode: requested_simulation || secret_key.is_none(),
            secret_key,
            publishable_key: non_empty("STRIPE_PUBLISHABLE_KEY"),
            webhook_secret: non_empty("STRIPE_WEBHOOK_SECRET"),
            api_base: std::env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| DEFAULT_STRIPE_API_BASE.into())
                .trim_end_matches('/')
                .to_string(),
        }
    }
}
