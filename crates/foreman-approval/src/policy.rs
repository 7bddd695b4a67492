//! Run-wide approval policy.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::broker::ApprovalBroker;
use crate::cache::DecisionCache;
use crate::provider::DecisionProvider;

/// How the run treats invocations that require approval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    /// Consult the decision provider, possibly suspending for an external
    /// decision.
    #[default]
    Prompt,
    /// Approve everything that is not explicitly blocked.
    ApproveAll,
    /// Deny everything that is not pre-approved; denials are fatal.
    StrictDeny,
}

/// The run's approval policy: mode, decision provider, suspension broker,
/// and session decision cache.
///
/// Built once per run and shared by reference; every worker's gate consults
/// the same policy while keeping its own static per-tool configuration.
#[derive(Clone)]
pub struct ApprovalPolicy {
    mode: ApprovalMode,
    provider: Arc<dyn DecisionProvider>,
    broker: Arc<ApprovalBroker>,
    cache: Arc<DecisionCache>,
}

impl ApprovalPolicy {
    /// Create a policy with a fresh broker and cache.
    #[must_use]
    pub fn new(mode: ApprovalMode, provider: Arc<dyn DecisionProvider>) -> Self {
        Self {
            mode,
            provider,
            broker: Arc::new(ApprovalBroker::new()),
            cache: Arc::new(DecisionCache::new()),
        }
    }

    /// The policy mode.
    #[must_use]
    pub fn mode(&self) -> ApprovalMode {
        self.mode
    }

    /// The decision provider.
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn DecisionProvider> {
        &self.provider
    }

    /// The suspension broker.
    #[must_use]
    pub fn broker(&self) -> &Arc<ApprovalBroker> {
        &self.broker
    }

    /// The session decision cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<DecisionCache> {
        &self.cache
    }
}

impl std::fmt::Debug for ApprovalPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalPolicy")
            .field("mode", &self.mode)
            .field("cached_decisions", &self.cache.len())
            .field("pending", &self.broker.pending_count())
            .finish_non_exhaustive()
    }
}
