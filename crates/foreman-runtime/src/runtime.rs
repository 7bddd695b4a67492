//! The top-level runtime facade.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use foreman_approval::{ApprovalBroker, ApprovalMode, ApprovalPolicy, DecisionProvider};
use foreman_core::{RunId, Verbosity, WorkerSpec};
use foreman_events::EventBus;
use foreman_llm::{Message, ModelProvider, Usage};
use foreman_toolset::InstanceProvider;

use crate::config::RunConfig;
use crate::error::RuntimeResult;
use crate::usage::{UsageCollector, UsageRecord};
use crate::worker::{Worker, WorkerOutput};

/// Default maximum delegation depth.
pub const DEFAULT_MAX_DEPTH: usize = 3;

/// Model used when neither an override nor a worker preference applies.
pub const DEFAULT_MODEL: &str = "default";

/// Everything a finished run hands back to the caller.
#[derive(Debug)]
pub struct RunOutcome {
    /// The entry worker's result.
    pub output: WorkerOutput,
    /// The entry worker's conversation. Nested workers' conversations are
    /// not here; only their tool-call/tool-result pairs are.
    pub messages: Vec<Message>,
    /// Every usage record appended during the run, across all depths.
    pub usage: Vec<UsageRecord>,
    /// Aggregated token totals.
    pub totals: Usage,
}

/// The top-level facade: builds one immutable [`RunConfig`] per run,
/// executes the entry worker at depth 0, and returns the result together
/// with aggregated usage.
///
/// # Example
///
/// ```rust,no_run
/// use foreman_runtime::Runtime;
/// use foreman_core::WorkerSpec;
/// use foreman_toolset::InstanceProvider;
/// use std::sync::Arc;
///
/// # async fn example(
/// #     model: Arc<dyn foreman_llm::ModelProvider>,
/// #     decisions: Arc<dyn foreman_approval::DecisionProvider>,
/// # ) -> Result<(), foreman_runtime::RuntimeError> {
/// let provider = Arc::new(InstanceProvider::new());
/// let runtime = Runtime::new(model, provider, decisions).with_max_depth(2);
///
/// let entry = WorkerSpec::new("planner", "Break the task down and delegate.");
/// let outcome = runtime.execute(&entry, "ship the release".into()).await?;
/// println!("{}", outcome.output);
/// # Ok(())
/// # }
/// ```
pub struct Runtime {
    model_client: Arc<dyn ModelProvider>,
    provider: Arc<InstanceProvider>,
    decisions: Arc<dyn DecisionProvider>,
    approval_mode: ApprovalMode,
    model_override: Option<String>,
    default_model: String,
    max_depth: usize,
    events: EventBus,
    verbosity: Verbosity,
}

impl Runtime {
    /// Create a runtime with defaults: prompt-mode approvals, depth bound
    /// of [`DEFAULT_MAX_DEPTH`], a fresh event bus.
    #[must_use]
    pub fn new(
        model_client: Arc<dyn ModelProvider>,
        provider: Arc<InstanceProvider>,
        decisions: Arc<dyn DecisionProvider>,
    ) -> Self {
        Self {
            model_client,
            provider,
            decisions,
            approval_mode: ApprovalMode::Prompt,
            model_override: None,
            default_model: DEFAULT_MODEL.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            events: EventBus::new(),
            verbosity: Verbosity::default(),
        }
    }

    /// Set the approval mode.
    #[must_use]
    pub fn with_approval_mode(mut self, mode: ApprovalMode) -> Self {
        self.approval_mode = mode;
        self
    }

    /// Force every worker onto one model, regardless of preferences.
    #[must_use]
    pub fn with_model_override(mut self, model: impl Into<String>) -> Self {
        self.model_override = Some(model.into());
        self
    }

    /// Set the fallback model.
    #[must_use]
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Set the maximum delegation depth. The entry point runs at depth 0.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Use an existing event bus instead of a fresh one.
    #[must_use]
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Set event verbosity.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// The event bus runs publish to.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The toolset instance provider.
    #[must_use]
    pub fn provider(&self) -> &Arc<InstanceProvider> {
        &self.provider
    }

    /// Execute one run of `entry` and return the aggregated outcome.
    ///
    /// Convenience for one-shot runs; interactive approval flows usually
    /// want [`session`](Self::session), which exposes the approval broker
    /// and cancellation while the run is in flight.
    ///
    /// # Errors
    ///
    /// Returns the structural faults of the taxonomy in
    /// [`RuntimeError`](crate::RuntimeError); recoverable tool failures
    /// never surface here.
    pub async fn execute(&self, entry: &WorkerSpec, input: Value) -> RuntimeResult<RunOutcome> {
        let mut session = self.session(entry.clone());
        let result = session.run_turn(input).await;
        session.finish().await;

        let output = result?;
        Ok(RunOutcome {
            output,
            messages: session.messages,
            usage: session.config.usage.snapshot(),
            totals: session.config.usage.totals(),
        })
    }

    /// Start a multi-turn session with `entry` at its root.
    ///
    /// The root context (and its first-level delegates) retain conversation
    /// history across turns; deeper frames stay single-shot.
    #[must_use]
    pub fn session(&self, entry: WorkerSpec) -> RunSession {
        let config = Arc::new(self.build_config());
        info!(run = %config.run_id, worker = %entry.name, max_depth = config.max_depth, "Run configured");
        RunSession {
            worker: Worker::new(Arc::new(entry)),
            config,
            messages: Vec::new(),
            histories: HashMap::new(),
        }
    }

    /// Build the immutable per-run configuration.
    fn build_config(&self) -> RunConfig {
        RunConfig {
            run_id: RunId::new(),
            model_client: Arc::clone(&self.model_client),
            provider: Arc::clone(&self.provider),
            model_override: self.model_override.clone(),
            default_model: self.default_model.clone(),
            approval: ApprovalPolicy::new(self.approval_mode, Arc::clone(&self.decisions)),
            max_depth: self.max_depth,
            events: self.events.clone(),
            usage: Arc::new(UsageCollector::new()),
            verbosity: self.verbosity,
            cancel: CancellationToken::new(),
        }
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("model_client", &self.model_client.name())
            .field("approval_mode", &self.approval_mode)
            .field("max_depth", &self.max_depth)
            .field("default_model", &self.default_model)
            .finish_non_exhaustive()
    }
}

/// One run in progress: the entry worker plus the conversation state that
/// survives between its turns.
pub struct RunSession {
    worker: Worker,
    config: Arc<RunConfig>,
    messages: Vec<Message>,
    histories: HashMap<String, Vec<Message>>,
}

impl RunSession {
    /// Run one turn of the entry worker.
    ///
    /// History moves into the turn and back out by ownership transfer;
    /// nothing aliases it while the turn runs.
    ///
    /// # Errors
    ///
    /// Structural faults abort the session's run; the conversation state
    /// accumulated in previous turns is consumed by the failed turn.
    pub async fn run_turn(&mut self, input: Value) -> RuntimeResult<WorkerOutput> {
        let prior = std::mem::take(&mut self.messages);
        let histories = std::mem::take(&mut self.histories);

        let outcome = self
            .worker
            .invoke_root(&self.config, input, prior, histories)
            .await?;

        self.messages = outcome.messages;
        self.histories = outcome.histories;
        Ok(outcome.output)
    }

    /// The entry worker's conversation so far.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Snapshot of usage records so far.
    #[must_use]
    pub fn usage(&self) -> Vec<UsageRecord> {
        self.config.usage.snapshot()
    }

    /// Aggregated token totals so far.
    #[must_use]
    pub fn totals(&self) -> Usage {
        self.config.usage.totals()
    }

    /// This run's ID.
    #[must_use]
    pub fn run_id(&self) -> &RunId {
        &self.config.run_id
    }

    /// The broker holding this run's suspended approval requests.
    ///
    /// External consumers take the request queue from here and post
    /// decisions back by request ID.
    #[must_use]
    pub fn approvals(&self) -> &Arc<ApprovalBroker> {
        self.config.approval.broker()
    }

    /// Cancel the run. Every in-flight child context observes the
    /// cancellation; suspended approval waits resolve as denials and their
    /// requests are retracted.
    pub fn cancel(&self) {
        self.config.cancel.cancel();
    }

    /// A handle for cancelling the run from outside while a turn is in
    /// flight.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.config.cancel.clone()
    }

    /// End the session, releasing the run's shared toolset instances.
    pub async fn finish(&mut self) {
        self.config.provider.release_run(&self.config.run_id).await;
    }
}

impl std::fmt::Debug for RunSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunSession")
            .field("worker", &self.worker.name())
            .field("run_id", &self.config.run_id)
            .field("turns", &self.messages.len())
            .finish_non_exhaustive()
    }
}
