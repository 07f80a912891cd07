// Custom error type for delivery operations
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(String),

    #[error("Invalid route policy: {0}")]
    Policy(String),

    #[error("Install pre-warm failed for {route}: {reason}")]
    Install { route: String, reason: String },

    #[error("Generic delivery error: {0}")]
    Generic(String),
}
