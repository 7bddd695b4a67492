//! Run-wide configuration.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use foreman_approval::ApprovalPolicy;
use foreman_core::{RunId, Verbosity};
use foreman_events::EventBus;
use foreman_llm::ModelProvider;
use foreman_toolset::InstanceProvider;

use crate::usage::UsageCollector;

/// Immutable configuration shared by every execution context in a run.
///
/// Built once by the [`Runtime`](crate::Runtime) and shared by reference.
/// Read-only after construction; the [`UsageCollector`] is the only field
/// with interior mutability, and it is append-only.
pub struct RunConfig {
    /// Identity of this run.
    pub run_id: RunId,
    /// The model backend, reached once per agent turn.
    pub model_client: Arc<dyn ModelProvider>,
    /// Resolves toolset references into live instances.
    pub provider: Arc<InstanceProvider>,
    /// Overrides every worker's model preference when set.
    pub model_override: Option<String>,
    /// Model used when neither an override nor a preference applies.
    pub default_model: String,
    /// The run's approval policy.
    pub approval: ApprovalPolicy,
    /// Maximum delegation depth; the entry point runs at depth 0.
    pub max_depth: usize,
    /// Sink for lifecycle events.
    pub events: EventBus,
    /// Shared usage collector.
    pub usage: Arc<UsageCollector>,
    /// Event verbosity.
    pub verbosity: Verbosity,
    /// Root cancellation token; child contexts derive from it.
    pub cancel: CancellationToken,
}

impl RunConfig {
    /// The model a worker runs on when `preference` is its declared choice
    /// and `inherited` the calling frame's model.
    #[must_use]
    pub fn effective_model(&self, preference: Option<&str>, inherited: &str) -> String {
        if let Some(model) = &self.model_override {
            return model.clone();
        }
        if let Some(model) = preference {
            return model.to_string();
        }
        inherited.to_string()
    }

    /// Whether tool-level events should be emitted.
    #[must_use]
    pub fn emit_tool_events(&self) -> bool {
        self.verbosity != Verbosity::Quiet
    }
}

impl std::fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunConfig")
            .field("run_id", &self.run_id)
            .field("model_override", &self.model_override)
            .field("default_model", &self.default_model)
            .field("max_depth", &self.max_depth)
            .field("verbosity", &self.verbosity)
            .finish_non_exhaustive()
    }
}
