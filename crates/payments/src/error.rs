/// Errors from the payment layer.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The gateway returned a non-2xx status code.
    #[error("Payment gateway error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The charge did not complete (e.g. card declined or 3-D Secure needed).
    #[error("Payment not completed: {0}")]
    Declined(String),

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("Payment gateway not configured: {0}")]
    NotConfigured(&'static str),
}
