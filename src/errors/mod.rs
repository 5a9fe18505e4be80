use thiserror::Error;

/// Typed error hierarchy for switchboard.
///
/// Use at module boundaries (agent invocation, backend calls, config validation, the
/// conversation store). Leaf functions can keep using `anyhow::Result`; the `Internal`
/// variant allows seamless conversion via the `?` operator.
#[derive(Debug, Error)]
pub enum SwitchboardError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Agent error: {message}")]
    Agent { message: String, retryable: bool },

    #[error("{backend} backend error: {message}")]
    Backend { backend: String, message: String },

    #[error("Conversation store error: {0}")]
    Store(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl SwitchboardError {
    /// Whether this error is transient and the operation could be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Agent { retryable, .. } => *retryable,
            Self::Backend { .. } | Self::Internal(_) => true,
            Self::Config(_) | Self::Store(_) | Self::NotFound(_) => false,
        }
    }
}
