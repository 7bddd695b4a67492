//! Decision provider trait.

use async_trait::async_trait;

use crate::request::{ApprovalDecision, ApprovalRequest};

/// What a decision provider answered for one request.
#[derive(Debug, Clone)]
pub enum ProviderVerdict {
    /// The provider decided immediately.
    Decided(ApprovalDecision),
    /// The provider cannot decide now; the request should be handed to the
    /// external consumer via the [`ApprovalBroker`](crate::ApprovalBroker)
    /// and the calling task suspended until a decision is posted back.
    Pending,
}

/// Source of approval decisions.
///
/// Frontends implement this to provide their own decision UX. A provider
/// either answers immediately (auto-approve, auto-deny, scripted decisions)
/// or returns [`ProviderVerdict::Pending`] to suspend the caller until an
/// interactive decision arrives through the broker.
#[async_trait]
pub trait DecisionProvider: Send + Sync {
    /// Decide on a request, or defer it.
    async fn decide(&self, request: &ApprovalRequest) -> ProviderVerdict;
}
