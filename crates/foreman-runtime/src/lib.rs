//! Foreman Runtime - Recursive worker delegation under a depth bound and
//! approval-gated tool dispatch.
//!
//! This crate provides:
//! - [`Runtime`] - the facade: one immutable [`RunConfig`] per run, a root
//!   [`ExecutionContext`] at depth 0, aggregated usage and messages
//! - [`ExecutionContext`] / [`CallFrame`] - per-invocation state, forking
//!   at `depth + 1`, ordered tool dispatch
//! - [`Worker`] - resolving a definition's toolsets, wrapping them with its
//!   own approval configuration, and running one agent turn
//! - [`UsageCollector`] - the run's append-only accounting
//!
//! # Architecture
//!
//! A run is a tree of execution contexts over one cooperative scheduler.
//! Workers delegate to other workers as if they were tools; every hop
//! forks a child frame at `depth + 1`, bounded by the run's `max_depth`.
//! Cycles in the delegation graph are allowed - the depth counter is the
//! safety valve, not cycle detection. Each invocation resolves its own
//! toolset instances; call-scoped instances are never shared between
//! contexts and are cleaned up exactly once on every exit path.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod config;
mod context;
mod error;
mod frame;
mod registry;
mod runtime;
mod usage;
mod worker;

#[cfg(test)]
mod tests;

pub use config::RunConfig;
pub use context::{ExecutionContext, RunPhase};
pub use error::{RuntimeError, RuntimeResult};
pub use frame::CallFrame;
pub use registry::ToolRegistry;
pub use runtime::{DEFAULT_MAX_DEPTH, DEFAULT_MODEL, RunOutcome, RunSession, Runtime};
pub use usage::{UsageCollector, UsageRecord};
pub use worker::{Worker, WorkerOutput};

// Re-export collaborator types callers always need alongside the runtime.
pub use foreman_approval::{ApprovalMode, DecisionProvider};
pub use foreman_core::{ToolsetScope, Verbosity, WorkerSpec};
pub use foreman_toolset::InstanceProvider;
