use thiserror::Error;

/// Failure from an external value provider. The evaluator never retries;
/// the caller decides whether to retry or fall back to the RNG path.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum RollError {
    /// An exploding term kept qualifying past the batch cap. Happens with
    /// degenerate rules like an explode threshold of 1.
    #[error("exploding dice exceeded the explosion batch cap")]
    ExplosionOverflow,
    #[error("value provider failed: {0}")]
    Provider(#[from] ProviderError),
}
