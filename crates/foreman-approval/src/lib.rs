//! Foreman Approval - Gateway between a worker's tool calls and the
//! operator's consent.
//!
//! Every tool invocation passes a decision step before any side effect:
//!
//! 1. The toolset's own argument-aware [`ToolOpinion`](foreman_toolset::ToolOpinion)
//!    is consulted first. A `Blocked` verdict is final.
//! 2. The worker's static per-tool `pre_approved` configuration.
//! 3. Otherwise the run's [`ApprovalPolicy`] decides: auto-approve,
//!    auto-deny, or ask the [`DecisionProvider`] — which may answer
//!    immediately or suspend the calling task until an external decision
//!    arrives through the [`ApprovalBroker`].
//!
//! Decisions remembered for the session are cached by
//! `(tool name, canonicalized arguments)` and skip the decision step on
//! later identical calls.
//!
//! # Example
//!
//! ```
//! use foreman_approval::{ApprovalDecision, Remember};
//!
//! let approved = ApprovalDecision::approve().with_remember(Remember::Session);
//! assert!(approved.approved);
//!
//! let denied = ApprovalDecision::deny("too risky");
//! assert!(!denied.approved);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod broker;
mod cache;
mod error;
mod gate;
mod gated;
mod policy;
mod provider;
mod request;

pub use broker::{ApprovalBroker, PendingRequests};
pub use cache::DecisionCache;
pub use error::{ApprovalError, ApprovalResult};
pub use gate::{ApprovalGate, ApprovalProof};
pub use gated::{GatedCallError, GatedToolset};
pub use policy::{ApprovalMode, ApprovalPolicy};
pub use provider::{DecisionProvider, ProviderVerdict};
pub use request::{ApprovalDecision, ApprovalRequest, Remember, RequestId, canonicalize_args};
