use std::io;

/// Custom error type for runner_dispatch operations
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("webhook signature validation failed: {0}")]
    Authentication(String),

    #[error("malformed webhook payload: {0}")]
    MalformedPayload(String),

    #[error("{service} request failed: {message}")]
    Dependency { service: String, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl WebhookError {
    /// Shorthand for a downstream dependency failure.
    pub fn dependency(service: &str, message: impl ToString) -> Self {
        Self::Dependency {
            service: service.to_string(),
            message: message.to_string(),
        }
    }
}

/// Helper type for Results that use WebhookError
pub type Result<T> = std::result::Result<T, WebhookError>;
