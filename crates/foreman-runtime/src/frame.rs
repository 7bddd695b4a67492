//! Per-invocation call frames.

use tracing::warn;

use foreman_llm::Message;

use crate::registry::ToolRegistry;

/// Mutable state of one execution context: live tool bindings, the
/// resolved model, recursion depth, the rendered prompt, and this worker's
/// own conversation history.
///
/// Forking never mutates the parent; a fork starts at `depth + 1` with
/// empty messages. History crosses invocations only through explicit
/// ownership transfer in [`next_turn`](Self::next_turn).
pub struct CallFrame {
    /// Live tool bindings for this call.
    pub registry: ToolRegistry,
    /// The resolved model for this call.
    pub model: String,
    /// Delegation hops from the entry point; 0 at entry.
    pub depth: usize,
    /// The rendered system prompt.
    pub prompt: String,
    /// This worker's own conversation history, and nothing else.
    pub messages: Vec<Message>,
    closed: bool,
}

impl CallFrame {
    /// Create an entry frame at depth 0.
    #[must_use]
    pub fn new(registry: ToolRegistry, model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            registry,
            model: model.into(),
            depth: 0,
            prompt: prompt.into(),
            messages: Vec::new(),
            closed: false,
        }
    }

    /// Fork a child frame at `depth + 1` with fresh, empty messages.
    ///
    /// # Panics
    ///
    /// Panics on depth overflow, which cannot occur for any depth the
    /// runtime admits (the configured bound is checked first).
    #[must_use]
    pub fn fork(
        &self,
        registry: ToolRegistry,
        model: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            model: model.into(),
            depth: self.depth.checked_add(1).expect("depth overflow"),
            prompt: prompt.into(),
            messages: Vec::new(),
            closed: false,
        }
    }

    /// Build a same-depth frame for a re-entrant call to the same worker,
    /// transferring ownership of the prior conversation into it.
    ///
    /// Toolset instances are not carried over; the new invocation resolves
    /// its own (call-scoped instances are never shared between contexts).
    #[must_use]
    pub fn next_turn(
        depth: usize,
        registry: ToolRegistry,
        model: impl Into<String>,
        prompt: impl Into<String>,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            registry,
            model: model.into(),
            depth,
            prompt: prompt.into(),
            messages,
            closed: false,
        }
    }

    /// Whether [`close`](Self::close) already ran.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Release the frame's owned toolset instances.
    ///
    /// Runs on every exit path of the owning context; safe to call twice.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.registry.close().await;
        self.closed = true;
    }
}

impl Drop for CallFrame {
    fn drop(&mut self) {
        // Cleanup is async and cannot run here; the registry's own drop
        // logs the leaked instances.
        if !self.closed && self.registry.owns_instances() {
            warn!(depth = self.depth, "Call frame dropped without close()");
        }
    }
}

impl std::fmt::Debug for CallFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallFrame")
            .field("model", &self.model)
            .field("depth", &self.depth)
            .field("messages", &self.messages.len())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
