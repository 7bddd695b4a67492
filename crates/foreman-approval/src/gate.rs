//! The approval gate - the decision step in front of every tool invocation.

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use foreman_core::WorkerApprovalConfig;
use foreman_events::{EventBus, EventMetadata, RuntimeEvent};
use foreman_toolset::ToolOpinion;

use crate::error::{ApprovalError, ApprovalResult};
use crate::policy::{ApprovalMode, ApprovalPolicy};
use crate::provider::ProviderVerdict;
use crate::request::{ApprovalDecision, ApprovalRequest};

/// How an invocation was authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalProof {
    /// The toolset's own opinion pre-approved it.
    ToolsetOpinion,
    /// The worker's static configuration pre-approved it.
    PreApproved,
    /// A session-remembered decision covered it.
    Cached,
    /// The policy mode approves everything.
    AutoApproved,
    /// The decision provider approved it immediately.
    ProviderDecision,
    /// An external decision arrived through the broker.
    ExternalDecision,
}

/// Per-worker approval gate.
///
/// Combines the worker's own static configuration with the run's policy.
/// One gate is built per worker invocation and is never inherited from the
/// calling worker.
pub struct ApprovalGate {
    worker: String,
    depth: usize,
    config: WorkerApprovalConfig,
    policy: ApprovalPolicy,
    events: EventBus,
    cancel: CancellationToken,
}

impl ApprovalGate {
    /// Create a gate for one worker invocation.
    #[must_use]
    pub fn new(
        worker: impl Into<String>,
        depth: usize,
        config: WorkerApprovalConfig,
        policy: ApprovalPolicy,
        events: EventBus,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            worker: worker.into(),
            depth,
            config,
            policy,
            events,
            cancel,
        }
    }

    /// Decide whether one invocation may proceed.
    ///
    /// Consults, in order: the toolset's own opinion (a block is final),
    /// the worker's static per-tool configuration, the session decision
    /// cache, and finally the policy mode - which may suspend the calling
    /// task until an external decision arrives.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::Blocked`] or [`ApprovalError::Denied`]; the
    /// `fatal` flag on denials tells the runtime whether to surface the
    /// error to the model or abort the run.
    pub async fn authorize(
        &self,
        tool: &str,
        args: &Value,
        opinion: ToolOpinion,
    ) -> ApprovalResult<ApprovalProof> {
        // A toolset-level block overrides everything, including static
        // pre-approval and approve-all mode.
        match opinion {
            ToolOpinion::Blocked { reason } => {
                return Err(ApprovalError::Blocked {
                    tool: tool.to_string(),
                    reason,
                });
            },
            ToolOpinion::PreApproved => {
                debug!(worker = %self.worker, tool, "Pre-approved by toolset opinion");
                return Ok(ApprovalProof::ToolsetOpinion);
            },
            ToolOpinion::NoOpinion => {},
        }

        if self.config.pre_approved(tool) == Some(true) {
            debug!(worker = %self.worker, tool, "Pre-approved by worker configuration");
            return Ok(ApprovalProof::PreApproved);
        }

        // Requires approval from here on.
        let request = ApprovalRequest::new(&self.worker, self.depth, tool, args.clone());
        let key = request.cache_key();

        if let Some(cached) = self.policy.cache().get(&key) {
            debug!(worker = %self.worker, tool, approved = cached.approved, "Session cache hit");
            if cached.approved {
                return Ok(ApprovalProof::Cached);
            }
            return Err(self.denied(tool, note_or(&cached, "remembered denial")));
        }

        match self.policy.mode() {
            ApprovalMode::ApproveAll => Ok(ApprovalProof::AutoApproved),
            ApprovalMode::StrictDeny => Err(ApprovalError::Denied {
                tool: tool.to_string(),
                reason: "denied by strict policy".to_string(),
                fatal: true,
            }),
            ApprovalMode::Prompt => self.prompt(tool, request, key).await,
        }
    }

    /// Consult the decision provider, suspending if it defers.
    async fn prompt(
        &self,
        tool: &str,
        request: ApprovalRequest,
        key: (String, String),
    ) -> ApprovalResult<ApprovalProof> {
        match self.policy.provider().decide(&request).await {
            ProviderVerdict::Decided(decision) => {
                self.policy.cache().remember(key, &decision);
                if decision.approved {
                    Ok(ApprovalProof::ProviderDecision)
                } else {
                    Err(self.denied(tool, note_or(&decision, "denied")))
                }
            },
            ProviderVerdict::Pending => self.suspend(tool, request, key).await,
        }
    }

    /// Hand the request to the external consumer and await the reply.
    async fn suspend(
        &self,
        tool: &str,
        request: ApprovalRequest,
        key: (String, String),
    ) -> ApprovalResult<ApprovalProof> {
        let request_id = request.id.clone();
        let receiver = self.policy.broker().suspend(request);

        self.events.publish(RuntimeEvent::ApprovalRequested {
            metadata: EventMetadata::new(&self.worker, self.depth),
            request_id: request_id.0,
            tool: tool.to_string(),
        });

        let decision = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                // Retract so the consumer never acts on a stale request.
                self.policy.broker().retract(&request_id);
                return Err(self.denied(tool, "approval wait cancelled".to_string()));
            },
            result = receiver => match result {
                Ok(decision) => decision,
                Err(_) => ApprovalDecision::deny("approval channel closed"),
            },
        };

        self.policy.cache().remember(key, &decision);
        if decision.approved {
            Ok(ApprovalProof::ExternalDecision)
        } else {
            Err(self.denied(tool, note_or(&decision, "denied")))
        }
    }

    fn denied(&self, tool: &str, reason: String) -> ApprovalError {
        ApprovalError::Denied {
            tool: tool.to_string(),
            reason,
            fatal: self.policy.mode() == ApprovalMode::StrictDeny,
        }
    }
}

impl std::fmt::Debug for ApprovalGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalGate")
            .field("worker", &self.worker)
            .field("depth", &self.depth)
            .field("mode", &self.policy.mode())
            .finish_non_exhaustive()
    }
}

fn note_or(decision: &ApprovalDecision, fallback: &str) -> String {
    decision
        .note
        .clone()
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::DecisionProvider;
    use crate::request::Remember;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts decisions and answers with a fixed one.
    struct CountingProvider {
        calls: AtomicUsize,
        decision: ApprovalDecision,
    }

    impl CountingProvider {
        fn new(decision: ApprovalDecision) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                decision,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DecisionProvider for CountingProvider {
        async fn decide(&self, _request: &ApprovalRequest) -> ProviderVerdict {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ProviderVerdict::Decided(self.decision.clone())
        }
    }

    /// Always defers to the broker.
    struct DeferringProvider;

    #[async_trait]
    impl DecisionProvider for DeferringProvider {
        async fn decide(&self, _request: &ApprovalRequest) -> ProviderVerdict {
            ProviderVerdict::Pending
        }
    }

    fn gate(config: WorkerApprovalConfig, policy: ApprovalPolicy) -> ApprovalGate {
        ApprovalGate::new(
            "worker",
            0,
            config,
            policy,
            EventBus::new(),
            CancellationToken::new(),
        )
    }

    // -----------------------------------------------------------------------
    // Precedence
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_blocked_overrides_pre_approved() {
        let provider = CountingProvider::new(ApprovalDecision::approve());
        let policy = ApprovalPolicy::new(ApprovalMode::ApproveAll, provider.clone());
        let config = WorkerApprovalConfig::new().allow("shell");
        let gate = gate(config, policy);

        let result = gate
            .authorize(
                "shell",
                &serde_json::json!({}),
                ToolOpinion::Blocked {
                    reason: "destructive".to_string(),
                },
            )
            .await;

        assert!(matches!(result, Err(ApprovalError::Blocked { .. })));
        // The block never reaches a decision step.
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_toolset_opinion_pre_approves() {
        let provider = CountingProvider::new(ApprovalDecision::deny("never asked"));
        let policy = ApprovalPolicy::new(ApprovalMode::Prompt, provider.clone());
        let gate = gate(WorkerApprovalConfig::new(), policy);

        let proof = gate
            .authorize("shell", &serde_json::json!({}), ToolOpinion::PreApproved)
            .await
            .unwrap();
        assert_eq!(proof, ApprovalProof::ToolsetOpinion);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_static_pre_approval_skips_provider() {
        let provider = CountingProvider::new(ApprovalDecision::deny("never asked"));
        let policy = ApprovalPolicy::new(ApprovalMode::Prompt, provider.clone());
        let config = WorkerApprovalConfig::new().allow("read");
        let gate = gate(config, policy);

        let proof = gate
            .authorize("read", &serde_json::json!({}), ToolOpinion::NoOpinion)
            .await
            .unwrap();
        assert_eq!(proof, ApprovalProof::PreApproved);
        assert_eq!(provider.calls(), 0);
    }

    // -----------------------------------------------------------------------
    // Policy modes
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_approve_all_mode() {
        let provider = CountingProvider::new(ApprovalDecision::deny("never asked"));
        let policy = ApprovalPolicy::new(ApprovalMode::ApproveAll, provider.clone());
        let gate = gate(WorkerApprovalConfig::new(), policy);

        let proof = gate
            .authorize("anything", &serde_json::json!({}), ToolOpinion::NoOpinion)
            .await
            .unwrap();
        assert_eq!(proof, ApprovalProof::AutoApproved);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_strict_deny_is_fatal() {
        let provider = CountingProvider::new(ApprovalDecision::approve());
        let policy = ApprovalPolicy::new(ApprovalMode::StrictDeny, provider.clone());
        let gate = gate(WorkerApprovalConfig::new(), policy);

        let result = gate
            .authorize("shell", &serde_json::json!({}), ToolOpinion::NoOpinion)
            .await;

        let Err(error) = result else {
            panic!("expected denial");
        };
        assert!(error.is_fatal());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_strict_deny_respects_pre_approval() {
        let provider = CountingProvider::new(ApprovalDecision::approve());
        let policy = ApprovalPolicy::new(ApprovalMode::StrictDeny, provider);
        let config = WorkerApprovalConfig::new().allow("read");
        let gate = gate(config, policy);

        let proof = gate
            .authorize("read", &serde_json::json!({}), ToolOpinion::NoOpinion)
            .await
            .unwrap();
        assert_eq!(proof, ApprovalProof::PreApproved);
    }

    // -----------------------------------------------------------------------
    // Session cache
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_session_remember_asks_once() {
        let provider = CountingProvider::new(
            ApprovalDecision::approve().with_remember(Remember::Session),
        );
        let policy = ApprovalPolicy::new(ApprovalMode::Prompt, provider.clone());
        let gate = gate(WorkerApprovalConfig::new(), policy);

        let args = serde_json::json!({"path": "a.txt"});
        let first = gate
            .authorize("read", &args, ToolOpinion::NoOpinion)
            .await
            .unwrap();
        let second = gate
            .authorize("read", &args, ToolOpinion::NoOpinion)
            .await
            .unwrap();

        assert_eq!(first, ApprovalProof::ProviderDecision);
        assert_eq!(second, ApprovalProof::Cached);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_different_args_ask_again() {
        let provider = CountingProvider::new(
            ApprovalDecision::approve().with_remember(Remember::Session),
        );
        let policy = ApprovalPolicy::new(ApprovalMode::Prompt, provider.clone());
        let gate = gate(WorkerApprovalConfig::new(), policy);

        gate.authorize("read", &serde_json::json!({"path": "a"}), ToolOpinion::NoOpinion)
            .await
            .unwrap();
        gate.authorize("read", &serde_json::json!({"path": "b"}), ToolOpinion::NoOpinion)
            .await
            .unwrap();

        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_one_time_decision_asks_again() {
        let provider = CountingProvider::new(ApprovalDecision::approve());
        let policy = ApprovalPolicy::new(ApprovalMode::Prompt, provider.clone());
        let gate = gate(WorkerApprovalConfig::new(), policy);

        let args = serde_json::json!({});
        gate.authorize("read", &args, ToolOpinion::NoOpinion)
            .await
            .unwrap();
        gate.authorize("read", &args, ToolOpinion::NoOpinion)
            .await
            .unwrap();

        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_remembered_denial_skips_provider() {
        let provider = CountingProvider::new(
            ApprovalDecision::deny("not this run").with_remember(Remember::Session),
        );
        let policy = ApprovalPolicy::new(ApprovalMode::Prompt, provider.clone());
        let gate = gate(WorkerApprovalConfig::new(), policy);

        let args = serde_json::json!({});
        assert!(gate
            .authorize("write", &args, ToolOpinion::NoOpinion)
            .await
            .is_err());
        assert!(gate
            .authorize("write", &args, ToolOpinion::NoOpinion)
            .await
            .is_err());
        assert_eq!(provider.calls(), 1);
    }

    // -----------------------------------------------------------------------
    // Suspension
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_pending_resolved_externally() {
        let policy = ApprovalPolicy::new(ApprovalMode::Prompt, Arc::new(DeferringProvider));
        let broker = Arc::clone(policy.broker());
        let gate = gate(WorkerApprovalConfig::new(), policy);

        let args = serde_json::json!({});
        let authorize = gate.authorize("shell", &args, ToolOpinion::NoOpinion);
        tokio::pin!(authorize);

        // Poll the gate until the request lands in the broker.
        let decision_posted = async {
            loop {
                let pending = broker.pending();
                if let Some(request) = pending.first() {
                    broker.resolve(&request.id, ApprovalDecision::approve());
                    break;
                }
                tokio::task::yield_now().await;
            }
        };

        let (result, ()) = tokio::join!(&mut authorize, decision_posted);
        assert_eq!(result.unwrap(), ApprovalProof::ExternalDecision);
        assert_eq!(broker.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_wait_is_denied_and_retracted() {
        let cancel = CancellationToken::new();
        let policy = ApprovalPolicy::new(ApprovalMode::Prompt, Arc::new(DeferringProvider));
        let broker = Arc::clone(policy.broker());
        let gate = ApprovalGate::new(
            "worker",
            0,
            WorkerApprovalConfig::new(),
            policy,
            EventBus::new(),
            cancel.clone(),
        );

        let args = serde_json::json!({});
        let authorize = gate.authorize("shell", &args, ToolOpinion::NoOpinion);
        tokio::pin!(authorize);

        let cancelled = async {
            loop {
                if broker.pending_count() > 0 {
                    cancel.cancel();
                    break;
                }
                tokio::task::yield_now().await;
            }
        };

        let (result, ()) = tokio::join!(&mut authorize, cancelled);
        let Err(ApprovalError::Denied { reason, .. }) = result else {
            panic!("expected denial");
        };
        assert!(reason.contains("cancelled"));
        assert_eq!(broker.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_suspension_emits_approval_requested_event() {
        let events = EventBus::new();
        let mut receiver = events.subscribe();
        let policy = ApprovalPolicy::new(ApprovalMode::Prompt, Arc::new(DeferringProvider));
        let broker = Arc::clone(policy.broker());
        let gate = ApprovalGate::new(
            "worker",
            2,
            WorkerApprovalConfig::new(),
            policy,
            events,
            CancellationToken::new(),
        );

        let args = serde_json::json!({});
        let authorize = gate.authorize("shell", &args, ToolOpinion::NoOpinion);
        tokio::pin!(authorize);

        let resolved = async {
            loop {
                if let Some(request) = broker.pending().first() {
                    broker.resolve(&request.id, ApprovalDecision::approve());
                    break;
                }
                tokio::task::yield_now().await;
            }
        };

        let (result, ()) = tokio::join!(&mut authorize, resolved);
        result.unwrap();

        let event = receiver.try_recv().expect("event published");
        assert_eq!(event.event_type(), "approval_requested");
        assert_eq!(event.metadata().depth, 2);
    }
}
