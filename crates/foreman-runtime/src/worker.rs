//! Worker invocation.
//!
//! A [`Worker`] turns an immutable [`WorkerSpec`] into one invocation:
//! resolve its toolset references, wrap them with its own approval
//! configuration, validate the effective model, fork a child context, run
//! one agent turn, and hand back a single result. The child's conversation
//! never leaves this module except by explicit ownership transfer for
//! re-entrant depth-1 calls.

use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use foreman_approval::{ApprovalGate, GatedToolset};
use foreman_core::{ToolsetScope, WorkerSpec};
use foreman_llm::Message;
use foreman_toolset::ResolvedToolset;

use crate::config::RunConfig;
use crate::context::ExecutionContext;
use crate::error::{RuntimeError, RuntimeResult};
use crate::frame::CallFrame;
use crate::registry::ToolRegistry;

/// The structured-or-text result of one worker invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerOutput {
    /// A plain text answer.
    Text(String),
    /// A JSON answer, produced when the worker declares an output schema.
    Structured(Value),
}

impl WorkerOutput {
    /// Text content, if this is a text output.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Structured(_) => None,
        }
    }

    /// Structured content, if this is a structured output.
    #[must_use]
    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            Self::Text(_) => None,
            Self::Structured(value) => Some(value),
        }
    }

    /// Render as tool-result content for a calling model.
    #[must_use]
    pub fn to_content(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Structured(value) => value.to_string(),
        }
    }
}

impl std::fmt::Display for WorkerOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_content())
    }
}

/// A worker bound to its definition, ready to invoke.
///
/// Stateless; the same worker may be invoked from many contexts
/// concurrently, each invocation getting its own frame and toolsets.
#[derive(Clone)]
pub struct Worker {
    spec: Arc<WorkerSpec>,
}

impl Worker {
    /// Bind a worker to its definition.
    #[must_use]
    pub fn new(spec: Arc<WorkerSpec>) -> Self {
        Self { spec }
    }

    /// The worker's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// The worker's definition.
    #[must_use]
    pub fn spec(&self) -> &Arc<WorkerSpec> {
        &self.spec
    }

    /// Invoke this worker as a delegation from `parent`.
    ///
    /// Fails fast - depth, then model compatibility, then toolset
    /// resolution - before the child context exists; a delegation past the
    /// depth bound is never invoked. Returns the output together with the
    /// child's conversation for the caller's ownership bookkeeping.
    ///
    /// Boxed because delegation recurses: a resolved toolset reference may
    /// itself be a worker.
    ///
    /// # Errors
    ///
    /// Fatal faults of the [`RuntimeError`] taxonomy; output-contract
    /// violations come back as [`RuntimeError::ToolInvocation`], which the
    /// dispatching context recovers into an error tool-result.
    pub fn invoke<'a>(
        &'a self,
        input: Value,
        parent: &'a ExecutionContext,
        prior: Vec<Message>,
    ) -> Pin<Box<dyn Future<Output = RuntimeResult<(WorkerOutput, Vec<Message>)>> + Send + 'a>>
    {
        Box::pin(async move {
            let config = parent.config();
            let child_depth = parent.child_depth(&self.spec.name)?;
            let model = self.validated_model(config, parent.model())?;
            let cancel = parent.cancel_token().child_token();
            let registry = self.resolve_registry(config, child_depth, &cancel)?;

            let mut child =
                parent.spawn_child(registry, &model, self.render_prompt(), &self.spec.name)?;
            if !prior.is_empty() {
                // Re-entrant call at depth <= 1: the prior conversation is
                // transferred in, never aliased.
                child.frame.messages = prior;
            }

            debug!(worker = %self.spec.name, depth = child_depth, model = %model, "Invoking worker");

            let result = child.run(self.input_text(&input)).await;
            child.close().await;

            let text = result?;
            let output = self.parse_output(&text)?;
            Ok((output, child.take_messages()))
        })
    }

    /// Invoke this worker as the entry point of a run, at depth 0.
    ///
    /// `prior` and `histories` carry the conversation state of a multi-turn
    /// session; both are empty for a one-shot run.
    pub(crate) async fn invoke_root(
        &self,
        config: &Arc<RunConfig>,
        input: Value,
        prior: Vec<Message>,
        histories: std::collections::HashMap<String, Vec<Message>>,
    ) -> RuntimeResult<RootOutcome> {
        let model = self.validated_model(config, &config.default_model)?;
        let cancel = config.cancel.child_token();
        let registry = self.resolve_registry(config, 0, &cancel)?;

        let frame = CallFrame::next_turn(0, registry, &model, self.render_prompt(), prior);
        let mut root = ExecutionContext::root(
            Arc::clone(config),
            frame,
            &self.spec.name,
            cancel,
            histories,
        );

        let result = root.run(self.input_text(&input)).await;
        root.close().await;

        let text = result?;
        let output = self.parse_output(&text)?;
        Ok(RootOutcome {
            output,
            messages: root.take_messages(),
            histories: root.take_histories(),
        })
    }

    /// Resolve toolset references and wrap them with this worker's own
    /// approval configuration - never the caller's.
    fn resolve_registry(
        &self,
        config: &Arc<RunConfig>,
        depth: usize,
        cancel: &CancellationToken,
    ) -> RuntimeResult<ToolRegistry> {
        let gate = Arc::new(ApprovalGate::new(
            &self.spec.name,
            depth,
            self.spec.approval.clone(),
            config.approval.clone(),
            config.events.clone(),
            cancel.clone(),
        ));

        let mut registry = ToolRegistry::new();
        for reference in &self.spec.toolsets {
            match config.provider.resolve(reference, &config.run_id) {
                Ok(ResolvedToolset::Capability { instance, scope }) => {
                    let owns = (scope == ToolsetScope::Call).then(|| Arc::clone(&instance));
                    registry.bind_capability(
                        Arc::new(GatedToolset::new(instance, Arc::clone(&gate))),
                        owns,
                    );
                },
                Ok(ResolvedToolset::Worker(child_spec)) => {
                    registry.bind_worker(child_spec, Arc::clone(&gate));
                },
                Err(_) => {
                    return Err(RuntimeError::ToolsetResolution {
                        worker: self.spec.name.clone(),
                        reference: reference.name().to_string(),
                    });
                },
            }
        }
        Ok(registry)
    }

    /// Validate the effective model against the worker's allow-list.
    fn validated_model(&self, config: &RunConfig, inherited: &str) -> RuntimeResult<String> {
        let model = config.effective_model(self.spec.model_preference.as_deref(), inherited);

        // An empty allow-list can never match; fail it as the
        // unsatisfiable configuration it is.
        let empty_list = matches!(&self.spec.compatible_models, Some(models) if models.is_empty());
        if empty_list || !self.spec.accepts_model(&model) {
            return Err(RuntimeError::ModelCompatibility {
                worker: self.spec.name.clone(),
                model,
            });
        }
        Ok(model)
    }

    /// Render the system prompt for this worker's turn.
    fn render_prompt(&self) -> String {
        match &self.spec.output_schema {
            Some(schema) => format!(
                "{}\n\nAnswer with a single JSON value matching this schema:\n{schema}",
                self.spec.instructions
            ),
            None => self.spec.instructions.clone(),
        }
    }

    /// Turn the invocation input into the worker's first user message.
    fn input_text(&self, input: &Value) -> String {
        if self.spec.input_schema.is_some() {
            // Schema-declared input is passed through verbatim as JSON.
            return input.to_string();
        }
        match input {
            Value::String(text) => text.clone(),
            Value::Object(map) => match map.get("task").and_then(Value::as_str) {
                Some(task) => task.to_string(),
                None => input.to_string(),
            },
            other => other.to_string(),
        }
    }

    /// Interpret the final answer per the worker's output schema.
    fn parse_output(&self, text: &str) -> RuntimeResult<WorkerOutput> {
        if self.spec.output_schema.is_none() {
            return Ok(WorkerOutput::Text(text.to_string()));
        }
        match serde_json::from_str::<Value>(text.trim()) {
            Ok(value) => Ok(WorkerOutput::Structured(value)),
            Err(parse_error) => Err(RuntimeError::ToolInvocation {
                tool: self.spec.name.clone(),
                message: format!(
                    "worker '{}' declared an output schema but answered with invalid JSON: {parse_error}",
                    self.spec.name
                ),
            }),
        }
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.spec.name)
            .field("toolsets", &self.spec.toolsets.len())
            .finish()
    }
}

/// Result of a root invocation, including the session state handed back to
/// the caller.
pub(crate) struct RootOutcome {
    pub(crate) output: WorkerOutput,
    pub(crate) messages: Vec<Message>,
    pub(crate) histories: std::collections::HashMap<String, Vec<Message>>,
}
