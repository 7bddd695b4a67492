//! Runtime error taxonomy.
//!
//! Anything representable as a tool result is recovered locally and handed
//! back to the model; the errors here are what remains - structural faults
//! that abort the enclosing execution context and propagate to the runtime
//! untouched. Every variant carries the worker (and where meaningful, the
//! depth) of origin.

use thiserror::Error;

/// Errors that abort an execution context.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A delegation would exceed the configured maximum depth.
    ///
    /// The recursion safety valve: cyclic call graphs are allowed, so the
    /// depth bound is the only thing standing between a self-delegating
    /// worker and an unbounded run.
    #[error("Delegation to '{worker}' would reach depth {depth}, exceeding the maximum of {max_depth}")]
    DepthExceeded {
        /// Worker that would have been invoked.
        worker: String,
        /// Depth the delegation would have reached.
        depth: usize,
        /// The configured bound.
        max_depth: usize,
    },

    /// An approval denial that the policy treats as fatal.
    ///
    /// Recoverable denials never take this form; they surface to the model
    /// as error tool-results.
    #[error("Approval denied in '{worker}' (depth {depth}) for tool '{tool}': {reason}")]
    ApprovalDenied {
        /// Worker whose call was denied.
        worker: String,
        /// Depth of the denying context.
        depth: usize,
        /// Tool name.
        tool: String,
        /// Why it was denied.
        reason: String,
    },

    /// The effective model is not in the worker's allow-list, or the
    /// allow-list itself is an empty (unsatisfiable) declaration.
    #[error("Worker '{worker}' is not compatible with model '{model}'")]
    ModelCompatibility {
        /// The worker being resolved.
        worker: String,
        /// The effective model that failed validation.
        model: String,
    },

    /// A tool invocation failed in a way the model could adapt to.
    ///
    /// Normally recovered as an error tool-result before reaching this
    /// type; it propagates only when conversion back to a tool result is
    /// impossible.
    #[error("Tool '{tool}' failed: {message}")]
    ToolInvocation {
        /// Tool name.
        tool: String,
        /// Failure description.
        message: String,
    },

    /// A named toolset reference did not resolve.
    #[error("Worker '{worker}' references unresolvable toolset '{reference}'")]
    ToolsetResolution {
        /// The worker being resolved.
        worker: String,
        /// The unresolved reference.
        reference: String,
    },

    /// The model provider failed; the turn cannot proceed.
    #[error("Model error in '{worker}' (depth {depth}): {source}")]
    Model {
        /// Worker whose turn failed.
        worker: String,
        /// Depth of the failing context.
        depth: usize,
        /// The underlying provider error.
        source: foreman_llm::LlmError,
    },

    /// The run was cancelled while this context was in flight.
    #[error("Run cancelled in '{worker}' (depth {depth})")]
    Cancelled {
        /// Worker that observed the cancellation.
        worker: String,
        /// Depth of the cancelled context.
        depth: usize,
    },
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
