//! Test fixtures.

use serde_json::Value;

use foreman_core::ToolsetScope;
use foreman_llm::ToolCall;
use foreman_toolset::{InstanceProvider, KvToolset, Toolset};

/// Build a tool call with JSON arguments.
#[must_use]
pub fn tool_call(id: &str, name: &str, args: Value) -> ToolCall {
    ToolCall::new(id, name).with_arguments(args)
}

/// Build a delegation call carrying a task description.
#[must_use]
pub fn delegate_call(id: &str, worker: &str, task: &str) -> ToolCall {
    tool_call(id, worker, serde_json::json!({ "task": task }))
}

/// Register a [`KvToolset`] under `name` with the given scope.
pub fn register_kv(provider: &InstanceProvider, name: &'static str, scope: ToolsetScope) {
    provider.register_capability(name, scope, move || {
        std::sync::Arc::new(KvToolset::new(name)) as std::sync::Arc<dyn Toolset>
    });
}
