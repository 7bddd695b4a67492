//! LLM error types.

use thiserror::Error;

/// Errors a model provider can return.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The backend rejected the request.
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The backend answered with something unusable.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The requested model is unknown to this provider.
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// The provider ran out of scripted or configured responses.
    #[error("Provider exhausted: {0}")]
    Exhausted(String),
}

/// Result type for provider operations.
pub type LlmResult<T> = Result<T, LlmError>;
