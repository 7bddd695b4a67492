//! Execution contexts.
//!
//! An [`ExecutionContext`] binds one [`CallFrame`] to the run configuration
//! and drives one worker invocation: the agent loop, approval-gated tool
//! dispatch, and delegation to child contexts at `depth + 1`.
//!
//! Everything here is async on the run's single cooperative scheduler. No
//! call path blocks its thread waiting on another call's loop; suspension
//! happens only at model calls, tool futures, and approval waits.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use foreman_events::{EventMetadata, RuntimeEvent};
use foreman_llm::{Message, ToolCall, ToolCallResult};
use foreman_toolset::ToolOpinion;

use crate::config::RunConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::frame::CallFrame;
use crate::registry::{ToolRegistry, ToolTarget};
use crate::usage::UsageRecord;
use crate::worker::Worker;

/// Lifecycle of one context's `run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Created, not yet running.
    Idle,
    /// Resolving toolsets and rendering the prompt.
    Preparing,
    /// In the agent loop.
    Streaming,
    /// Finished successfully.
    Completed,
    /// Failed. Terminal; the runtime never auto-retries.
    Failed,
}

/// One worker invocation in flight.
pub struct ExecutionContext {
    config: Arc<RunConfig>,
    pub(crate) frame: CallFrame,
    worker: String,
    cancel: CancellationToken,
    phase: RunPhase,
    /// Conversation histories of directly delegated workers. Only the
    /// depth-0 context retains these across turns; deeper frames delegate
    /// single-shot.
    histories: Mutex<HashMap<String, Vec<Message>>>,
}

impl ExecutionContext {
    /// Create the root context of a run, at depth 0.
    pub(crate) fn root(
        config: Arc<RunConfig>,
        frame: CallFrame,
        worker: impl Into<String>,
        cancel: CancellationToken,
        histories: HashMap<String, Vec<Message>>,
    ) -> Self {
        Self {
            config,
            frame,
            worker: worker.into(),
            cancel,
            phase: RunPhase::Idle,
            histories: Mutex::new(histories),
        }
    }

    /// Fork a child context at `depth + 1`, bound to the same run
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::DepthExceeded`] when the child would pass
    /// the configured maximum depth. Fatal; the delegation is never
    /// invoked.
    pub fn spawn_child(
        &self,
        registry: ToolRegistry,
        model: impl Into<String>,
        prompt: impl Into<String>,
        invocation: impl Into<String>,
    ) -> RuntimeResult<ExecutionContext> {
        let invocation = invocation.into();
        let child_depth = self.child_depth(&invocation)?;
        debug!(worker = %invocation, depth = child_depth, "Spawning child context");

        Ok(Self {
            config: Arc::clone(&self.config),
            frame: self.frame.fork(registry, model, prompt),
            worker: invocation,
            cancel: self.cancel.child_token(),
            phase: RunPhase::Idle,
            histories: Mutex::new(HashMap::new()),
        })
    }

    /// Validate that one more delegation hop fits under the depth bound.
    pub(crate) fn child_depth(&self, invocation: &str) -> RuntimeResult<usize> {
        let child_depth = self.frame.depth.saturating_add(1);
        if child_depth > self.config.max_depth {
            return Err(RuntimeError::DepthExceeded {
                worker: invocation.to_string(),
                depth: child_depth,
                max_depth: self.config.max_depth,
            });
        }
        Ok(child_depth)
    }

    /// Run one agent turn: feed the input to the model, dispatch the tool
    /// calls it requests in request order, repeat until a final text
    /// answer.
    ///
    /// Messages accumulate in the frame; whether they survive the
    /// invocation is the caller's ownership decision (frames deeper than 1
    /// are single-shot and discard theirs).
    ///
    /// # Errors
    ///
    /// Propagates structural faults (depth, fatal denial, model failure,
    /// cancellation); tool-level failures are recovered into error
    /// tool-results and never reach the caller.
    pub async fn run(&mut self, input: String) -> RuntimeResult<String> {
        self.phase = RunPhase::Preparing;

        if self.config.emit_tool_events() {
            self.emit(|metadata| RuntimeEvent::UserMessage {
                metadata,
                content: input.clone(),
            });
        }
        self.frame.messages.push(Message::user(input));

        self.phase = RunPhase::Streaming;
        let result = self.agent_loop().await;
        self.phase = if result.is_ok() {
            RunPhase::Completed
        } else {
            RunPhase::Failed
        };

        match &result {
            Ok(text) => self.emit(|metadata| RuntimeEvent::Completion {
                metadata,
                summary: summarize(text),
            }),
            Err(error) => self.emit(|metadata| RuntimeEvent::Error {
                metadata,
                message: error.to_string(),
            }),
        }

        result
    }

    /// The inner agent loop: model turn, then tool calls, repeat.
    async fn agent_loop(&mut self) -> RuntimeResult<String> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(self.cancelled());
            }

            let definitions = self.frame.registry.definitions();
            let completion = self.config.model_client.complete(
                &self.frame.model,
                &self.frame.messages,
                &definitions,
                &self.frame.prompt,
            );

            let response = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(self.cancelled()),
                result = completion => result.map_err(|source| RuntimeError::Model {
                    worker: self.worker.clone(),
                    depth: self.frame.depth,
                    source,
                })?,
            };

            self.config.usage.record(UsageRecord::new(
                &self.worker,
                self.frame.depth,
                &self.frame.model,
                response.usage,
            ));

            let calls = response.requested_calls().to_vec();
            if !calls.is_empty() {
                self.frame.messages.push(Message::assistant_with_tools(calls.clone()));

                // Dispatch in the order the model requested; never reorder.
                for call in &calls {
                    let result = self.call(call).await?;
                    self.frame.messages.push(Message::tool_result(result));
                }
                continue;
            }

            if let Some(text) = response.message.text() {
                let text = text.to_string();
                self.frame.messages.push(Message::assistant(&text));
                return Ok(text);
            }

            // Neither text nor tool calls; treat as an empty final answer.
            return Ok(String::new());
        }
    }

    /// Dispatch one model-requested tool call through the approval gate.
    ///
    /// Returns the tool result to feed back to the model. Recoverable
    /// failures (denials under a non-strict policy, tool errors, unknown
    /// names) become error results; structural faults propagate.
    ///
    /// # Errors
    ///
    /// Returns the structural faults described on
    /// [`run`](Self::run).
    pub async fn call(&self, call: &ToolCall) -> RuntimeResult<ToolCallResult> {
        if self.config.emit_tool_events() {
            self.emit(|metadata| RuntimeEvent::ToolCall {
                metadata,
                call_id: call.id.clone(),
                tool: call.name.clone(),
                arguments: call.arguments.clone(),
            });
        }

        let result = self.dispatch(call).await;

        if let Ok(tool_result) = &result
            && self.config.emit_tool_events()
        {
            // Full payloads only at verbose; the summary is enough for a
            // progress display.
            let content = if self.config.verbosity == foreman_core::Verbosity::Verbose {
                tool_result.content.clone()
            } else {
                summarize(&tool_result.content)
            };
            self.emit(|metadata| RuntimeEvent::ToolResult {
                metadata,
                call_id: tool_result.call_id.clone(),
                tool: call.name.clone(),
                content,
                is_error: tool_result.is_error,
            });
        }

        result
    }

    async fn dispatch(&self, call: &ToolCall) -> RuntimeResult<ToolCallResult> {
        let Some(binding) = self.frame.registry.get(&call.name) else {
            return Ok(ToolCallResult::error(
                &call.id,
                format!("unknown tool '{}'", call.name),
            ));
        };

        match &binding.target {
            ToolTarget::Capability(gated) => {
                match gated.invoke(&call.name, &call.arguments).await {
                    Ok(content) => Ok(ToolCallResult::success(&call.id, content)),
                    Err(error) if error.is_fatal() => Err(RuntimeError::ApprovalDenied {
                        worker: self.worker.clone(),
                        depth: self.frame.depth,
                        tool: call.name.clone(),
                        reason: error.to_string(),
                    }),
                    Err(error) => Ok(ToolCallResult::error(&call.id, error.to_string())),
                }
            },
            ToolTarget::Worker { spec, gate } => {
                // Delegation calls pass the same gate as any other tool.
                match gate
                    .authorize(&call.name, &call.arguments, ToolOpinion::NoOpinion)
                    .await
                {
                    Ok(_proof) => {},
                    Err(error) if error.is_fatal() => {
                        return Err(RuntimeError::ApprovalDenied {
                            worker: self.worker.clone(),
                            depth: self.frame.depth,
                            tool: call.name.clone(),
                            reason: error.to_string(),
                        });
                    },
                    Err(error) => {
                        return Ok(ToolCallResult::error(&call.id, error.to_string()));
                    },
                }

                self.delegate(call, Arc::clone(spec)).await
            },
        }
    }

    /// Invoke a delegated worker and fold its result into a tool result.
    ///
    /// Only the tool-call/tool-result pair crosses this boundary; the
    /// child's conversation stays private to its frame.
    async fn delegate(
        &self,
        call: &ToolCall,
        spec: Arc<foreman_core::WorkerSpec>,
    ) -> RuntimeResult<ToolCallResult> {
        let retains_history = self.frame.depth == 0;
        let prior = if retains_history {
            self.histories
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .remove(&spec.name)
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        let worker = Worker::new(spec);
        match worker.invoke(call.arguments.clone(), self, prior).await {
            Ok((output, messages)) => {
                if retains_history {
                    self.histories
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner)
                        .insert(worker.name().to_string(), messages);
                }
                Ok(ToolCallResult::success(&call.id, output.to_content()))
            },
            // The one child fault the calling model may adapt to: a result
            // that failed the worker's declared output contract.
            Err(RuntimeError::ToolInvocation { message, .. }) => {
                warn!(worker = %worker.name(), %message, "Delegated worker broke its output contract");
                Ok(ToolCallResult::error(&call.id, message))
            },
            Err(fatal) => Err(fatal),
        }
    }

    /// Release the frame's owned toolset instances. Runs on every exit
    /// path of the invocation.
    pub async fn close(&mut self) {
        self.frame.close().await;
    }

    /// This context's worker name.
    #[must_use]
    pub fn worker(&self) -> &str {
        &self.worker
    }

    /// This context's depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frame.depth
    }

    /// The model this context runs on.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.frame.model
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// The run configuration.
    #[must_use]
    pub fn config(&self) -> &Arc<RunConfig> {
        &self.config
    }

    /// This context's cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Extract the frame's conversation, leaving it empty.
    pub(crate) fn take_messages(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.frame.messages)
    }

    /// Extract the retained delegate histories, leaving them empty.
    pub(crate) fn take_histories(&mut self) -> HashMap<String, Vec<Message>> {
        std::mem::take(
            &mut *self
                .histories
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        )
    }

    fn cancelled(&self) -> RuntimeError {
        RuntimeError::Cancelled {
            worker: self.worker.clone(),
            depth: self.frame.depth,
        }
    }

    fn emit(&self, build: impl FnOnce(EventMetadata) -> RuntimeEvent) {
        let metadata = EventMetadata::new(&self.worker, self.frame.depth)
            .with_run_id(self.config.run_id.as_uuid());
        self.config.events.publish(build(metadata));
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("worker", &self.worker)
            .field("depth", &self.frame.depth)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

/// Compress a final answer for the completion event.
fn summarize(text: &str) -> String {
    const MAX: usize = 120;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let mut summary: String = text.chars().take(MAX).collect();
        summary.push_str("...");
        summary
    }
}
