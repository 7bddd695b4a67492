//! Per-context tool registry.
//!
//! Maps the tool names a model can request to what actually serves them: a
//! gated capability instance or a worker delegation. Resolved once per
//! execution context; the variants are closed on purpose - there is no open
//! reflection over tool kinds.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use foreman_approval::{ApprovalGate, GatedToolset};
use foreman_core::WorkerSpec;
use foreman_llm::ToolDefinition;
use foreman_toolset::{ToolDescriptor, Toolset};

/// Upper bound on a delegation tool's description taken from instructions.
const MAX_DESCRIPTION_CHARS: usize = 200;

/// What a tool name dispatches to.
pub(crate) enum ToolTarget {
    /// A capability tool behind its approval gate.
    Capability(Arc<GatedToolset>),
    /// A delegation to another worker, gated by the calling worker's
    /// approval configuration.
    Worker {
        /// The worker to invoke.
        spec: Arc<WorkerSpec>,
        /// The calling worker's gate.
        gate: Arc<ApprovalGate>,
    },
}

/// One resolved tool binding.
pub(crate) struct ToolBinding {
    pub(crate) target: ToolTarget,
    pub(crate) descriptor: ToolDescriptor,
}

/// The live tool bindings of one execution context.
///
/// Also tracks ownership of call-scoped instances: [`close`](Self::close)
/// runs their cleanup exactly once, and a registry dropped while still
/// owning instances is a bug worth logging.
pub struct ToolRegistry {
    bindings: HashMap<String, ToolBinding>,
    owned: Vec<Arc<dyn Toolset>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bindings: HashMap::new(),
            owned: Vec::new(),
        }
    }

    /// Bind every tool of a gated capability instance.
    ///
    /// `owns` is the underlying instance when it is call-scoped and this
    /// registry is responsible for its cleanup.
    pub(crate) fn bind_capability(
        &mut self,
        gated: Arc<GatedToolset>,
        owns: Option<Arc<dyn Toolset>>,
    ) {
        for descriptor in gated.list_tools() {
            let name = descriptor.name.clone();
            if self.bindings.contains_key(&name) {
                debug!(tool = %name, "Replacing earlier binding for tool name");
            }
            self.bindings.insert(
                name,
                ToolBinding {
                    target: ToolTarget::Capability(Arc::clone(&gated)),
                    descriptor,
                },
            );
        }
        if let Some(instance) = owns {
            self.owned.push(instance);
        }
    }

    /// Bind a worker as a single tool named after it.
    pub(crate) fn bind_worker(&mut self, spec: Arc<WorkerSpec>, gate: Arc<ApprovalGate>) {
        let descriptor = delegation_descriptor(&spec);
        if self.bindings.contains_key(&descriptor.name) {
            debug!(tool = %descriptor.name, "Replacing earlier binding for tool name");
        }
        self.bindings.insert(
            descriptor.name.clone(),
            ToolBinding {
                target: ToolTarget::Worker { spec, gate },
                descriptor,
            },
        );
    }

    /// Look up a binding by tool name.
    pub(crate) fn get(&self, name: &str) -> Option<&ToolBinding> {
        self.bindings.get(name)
    }

    /// Tool definitions for the model, sorted by name for a stable prompt.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> = self
            .bindings
            .values()
            .map(|binding| binding.descriptor.to_definition())
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Number of bound tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether no tools are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Whether this registry still owns call-scoped instances.
    #[must_use]
    pub fn owns_instances(&self) -> bool {
        !self.owned.is_empty()
    }

    /// Clean up owned call-scoped instances.
    ///
    /// Draining makes a second call a no-op, so cleanup runs exactly once
    /// per instance no matter how the owning context exits.
    pub async fn close(&mut self) {
        for instance in self.owned.drain(..) {
            debug!(toolset = %instance.name(), "Cleaning up call-scoped instance");
            instance.cleanup().await;
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ToolRegistry {
    fn drop(&mut self) {
        if !self.owned.is_empty() {
            warn!(
                instances = self.owned.len(),
                "Tool registry dropped with owned instances still open; \
                 cleanup did not run"
            );
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.bindings.keys().collect();
        names.sort();
        f.debug_struct("ToolRegistry")
            .field("tools", &names)
            .field("owned", &self.owned.len())
            .finish()
    }
}

/// Build the single-tool descriptor a worker presents to its callers.
fn delegation_descriptor(spec: &WorkerSpec) -> ToolDescriptor {
    let summary: String = spec
        .instructions
        .lines()
        .next()
        .unwrap_or_default()
        .chars()
        .take(MAX_DESCRIPTION_CHARS)
        .collect();

    let schema = spec.input_schema.clone().unwrap_or_else(|| {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task": {
                    "type": "string",
                    "description": "The task to delegate to this worker"
                }
            },
            "required": ["task"]
        })
    });

    ToolDescriptor::new(&spec.name, summary).with_schema(schema)
}
