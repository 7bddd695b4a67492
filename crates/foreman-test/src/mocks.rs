//! Mock implementations for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use foreman_approval::{
    ApprovalDecision, ApprovalRequest, DecisionProvider, ProviderVerdict, Remember,
};
use foreman_llm::{LlmError, LlmResult, Message, ModelProvider, ModelResponse, ToolDefinition};

struct Script {
    marker: String,
    responses: VecDeque<ModelResponse>,
}

/// A deterministic model provider scripted per worker.
///
/// Each script is keyed by a marker substring matched against the system
/// prompt of the call (worker instructions are distinct per worker, so a
/// fragment of them addresses one worker unambiguously). Responses pop in
/// order; running out of them, or calling with an unmatched system prompt,
/// is a test failure surfaced as [`LlmError::Exhausted`].
#[derive(Default)]
pub struct ScriptedProvider {
    scripts: Mutex<Vec<Script>>,
    seen_models: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    /// Create a provider with no scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `responses` for calls whose system prompt contains `marker`.
    ///
    /// This works in both sync and async contexts without blocking.
    #[must_use]
    pub fn script(self, marker: impl Into<String>, responses: Vec<ModelResponse>) -> Self {
        if let Ok(mut guard) = self.scripts.lock() {
            guard.push(Script {
                marker: marker.into(),
                responses: responses.into(),
            });
        }
        self
    }

    /// Total number of completed calls.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Models requested so far, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn seen_models(&self) -> Vec<String> {
        self.seen_models
            .lock()
            .expect("seen_models mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        model: &str,
        _messages: &[Message],
        _tools: &[ToolDefinition],
        system: &str,
    ) -> LlmResult<ModelResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_models
            .lock()
            .map_err(|_| LlmError::RequestFailed("seen_models mutex poisoned".to_string()))?
            .push(model.to_string());

        let mut scripts = self
            .scripts
            .lock()
            .map_err(|_| LlmError::RequestFailed("scripts mutex poisoned".to_string()))?;

        let script = scripts
            .iter_mut()
            .find(|script| system.contains(&script.marker))
            .ok_or_else(|| {
                LlmError::Exhausted(format!("no script matches system prompt: {system:.60}"))
            })?;

        script.responses.pop_front().ok_or_else(|| {
            LlmError::Exhausted(format!("script '{}' ran out of responses", script.marker))
        })
    }
}

/// Decision provider that approves everything, optionally remembering.
pub struct ApproveAllDecisions {
    remember: Remember,
    calls: AtomicUsize,
}

impl ApproveAllDecisions {
    /// Approve once per request.
    #[must_use]
    pub fn new() -> Self {
        Self {
            remember: Remember::None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Approve with session memory.
    #[must_use]
    pub fn remembering() -> Self {
        Self {
            remember: Remember::Session,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of decisions made.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for ApproveAllDecisions {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DecisionProvider for ApproveAllDecisions {
    async fn decide(&self, _request: &ApprovalRequest) -> ProviderVerdict {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ProviderVerdict::Decided(ApprovalDecision::approve().with_remember(self.remember))
    }
}

/// Decision provider that denies everything.
#[derive(Default)]
pub struct DenyAllDecisions {
    calls: AtomicUsize,
}

impl DenyAllDecisions {
    /// Create a denying provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of decisions made.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecisionProvider for DenyAllDecisions {
    async fn decide(&self, _request: &ApprovalRequest) -> ProviderVerdict {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ProviderVerdict::Decided(ApprovalDecision::deny("denied by test"))
    }
}

/// Decision provider that defers every request to the broker.
#[derive(Default)]
pub struct DeferAllDecisions;

impl DeferAllDecisions {
    /// Create a deferring provider.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DecisionProvider for DeferAllDecisions {
    async fn decide(&self, _request: &ApprovalRequest) -> ProviderVerdict {
        ProviderVerdict::Pending
    }
}
