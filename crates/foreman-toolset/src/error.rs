//! Toolset error types.

use thiserror::Error;

/// Errors a toolset invocation can produce.
#[derive(Debug, Error)]
pub enum ToolsetError {
    /// The named tool does not exist in this toolset.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// The arguments did not match the tool's expectations.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The tool ran and failed.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// The referenced handle does not exist.
    #[error("Unknown handle: {0}")]
    UnknownHandle(String),

    /// Nothing is registered under the referenced name.
    ///
    /// Unlike the invocation errors above, the runtime treats this as fatal:
    /// an unresolvable reference is a configuration fault, not something the
    /// model can adapt to.
    #[error("Unresolved toolset reference: {0}")]
    UnknownReference(String),
}

/// Result type for toolset operations.
pub type ToolsetResult<T> = Result<T, ToolsetError>;
