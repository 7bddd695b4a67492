//! Approval error types.

use thiserror::Error;

/// Errors the approval gateway can produce.
#[derive(Debug, Clone, Error)]
pub enum ApprovalError {
    /// The toolset itself refused the invocation.
    ///
    /// A block is final: static pre-approval can skip the prompt but never
    /// bypass an explicit block.
    #[error("Tool '{tool}' blocked by its toolset: {reason}")]
    Blocked {
        /// Tool name.
        tool: String,
        /// Why the toolset refused.
        reason: String,
    },

    /// The invocation was denied.
    #[error("Approval denied for '{tool}': {reason}")]
    Denied {
        /// Tool name.
        tool: String,
        /// Why it was denied.
        reason: String,
        /// Whether this denial aborts the run (strict policy) instead of
        /// surfacing to the model as a tool error.
        fatal: bool,
    },
}

impl ApprovalError {
    /// Whether this error should abort the run rather than surface to the
    /// model as a recoverable tool error.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Blocked { .. } => false,
            Self::Denied { fatal, .. } => *fatal,
        }
    }

    /// The tool the error concerns.
    #[must_use]
    pub fn tool(&self) -> &str {
        match self {
            Self::Blocked { tool, .. } | Self::Denied { tool, .. } => tool,
        }
    }
}

/// Result type for approval operations.
pub type ApprovalResult<T> = Result<T, ApprovalError>;
