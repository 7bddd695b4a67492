//! Shared helpers for the integration tests.

// Each test binary compiles this module; not every binary uses every helper.
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use foreman_core::ToolsetScope;
use foreman_llm::{LlmResult, Message, ModelProvider, ModelResponse, ToolDefinition};
use foreman_test::ScriptedProvider;
use foreman_toolset::{
    InstanceProvider, KvToolset, OpinionRules, ToolDescriptor, ToolOpinion, Toolset, ToolsetResult,
};

/// Register a call-scoped [`KvToolset`] whose created instances stay
/// inspectable after the run.
pub fn tracking_kv(
    provider: &InstanceProvider,
    name: &'static str,
) -> Arc<Mutex<Vec<Arc<KvToolset>>>> {
    let created: Arc<Mutex<Vec<Arc<KvToolset>>>> = Arc::new(Mutex::new(Vec::new()));
    let created_clone = Arc::clone(&created);
    provider.register_capability(name, ToolsetScope::Call, move || {
        let instance = Arc::new(KvToolset::new(name));
        created_clone
            .lock()
            .expect("tracking mutex poisoned")
            .push(Arc::clone(&instance));
        instance as Arc<dyn Toolset>
    });
    created
}

/// A toolset that counts its cleanups and answers every `touch` call.
pub struct CleanupProbe {
    cleanups: Arc<AtomicUsize>,
}

#[async_trait]
impl Toolset for CleanupProbe {
    fn name(&self) -> &str {
        "probe"
    }

    fn list_tools(&self) -> Vec<ToolDescriptor> {
        vec![ToolDescriptor::new("touch", "Touch the probe")]
    }

    async fn invoke(&self, _tool: &str, _args: &serde_json::Value) -> ToolsetResult<String> {
        Ok("touched".to_string())
    }

    async fn cleanup(&self) {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
    }
}

/// Register a [`CleanupProbe`] and return its cleanup counter.
pub fn register_probe(
    provider: &InstanceProvider,
    name: &'static str,
    scope: ToolsetScope,
) -> Arc<AtomicUsize> {
    let cleanups = Arc::new(AtomicUsize::new(0));
    let cleanups_clone = Arc::clone(&cleanups);
    provider.register_capability(name, scope, move || {
        Arc::new(CleanupProbe {
            cleanups: Arc::clone(&cleanups_clone),
        }) as Arc<dyn Toolset>
    });
    cleanups
}

/// A shell-like toolset whose opinion pre-approves read-only commands and
/// blocks destructive ones.
pub struct OpinionatedShell {
    rules: OpinionRules,
    executed: Arc<AtomicUsize>,
}

impl OpinionatedShell {
    pub fn new(executed: Arc<AtomicUsize>) -> Self {
        Self {
            rules: OpinionRules::over("command")
                .pre_approve("git status*")
                .expect("valid glob")
                .block("rm *")
                .expect("valid glob")
                .build()
                .expect("valid rules"),
            executed,
        }
    }
}

#[async_trait]
impl Toolset for OpinionatedShell {
    fn name(&self) -> &str {
        "shell"
    }

    fn list_tools(&self) -> Vec<ToolDescriptor> {
        vec![ToolDescriptor::new("exec", "Run a command")]
    }

    async fn invoke(&self, _tool: &str, args: &serde_json::Value) -> ToolsetResult<String> {
        self.executed.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "ran: {}",
            args.get("command")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("")
        ))
    }

    fn opinion_on(&self, _tool: &str, args: &serde_json::Value) -> ToolOpinion {
        self.rules.evaluate(args)
    }
}

/// Register an [`OpinionatedShell`] and return its execution counter.
pub fn register_shell(provider: &InstanceProvider, name: &'static str) -> Arc<AtomicUsize> {
    let executed = Arc::new(AtomicUsize::new(0));
    let executed_clone = Arc::clone(&executed);
    provider.register_capability(name, ToolsetScope::Call, move || {
        Arc::new(OpinionatedShell::new(Arc::clone(&executed_clone))) as Arc<dyn Toolset>
    });
    executed
}

/// A provider that records, per call whose system prompt contains a marker,
/// how many messages the call carried. Everything else is delegated to the
/// wrapped [`ScriptedProvider`].
pub struct MessageCountingProvider {
    inner: ScriptedProvider,
    marker: String,
    counts: Arc<Mutex<Vec<usize>>>,
}

impl MessageCountingProvider {
    pub fn new(inner: ScriptedProvider, marker: impl Into<String>) -> Self {
        Self {
            inner,
            marker: marker.into(),
            counts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn counts(&self) -> Arc<Mutex<Vec<usize>>> {
        Arc::clone(&self.counts)
    }
}

#[async_trait]
impl ModelProvider for MessageCountingProvider {
    fn name(&self) -> &str {
        "message-counting"
    }

    async fn complete(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        system: &str,
    ) -> LlmResult<ModelResponse> {
        if system.contains(&self.marker) {
            self.counts
                .lock()
                .expect("counts mutex poisoned")
                .push(messages.len());
        }
        self.inner.complete(model, messages, tools, system).await
    }
}
