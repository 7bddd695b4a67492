//! The toolset invocation contract.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ToolsetResult;
use foreman_llm::ToolDefinition;

/// Description of one tool inside a toolset.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    /// Tool name, unique within its execution context.
    pub name: String,
    /// Description shown to the model.
    pub description: String,
    /// Input JSON schema.
    pub input_schema: Value,
}

impl ToolDescriptor {
    /// Create a descriptor with a default object schema.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: serde_json::json!({"type": "object"}),
        }
    }

    /// Set the input schema.
    #[must_use]
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    /// Convert to the model-facing tool definition.
    #[must_use]
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition::new(&self.name)
            .with_description(&self.description)
            .with_schema(self.input_schema.clone())
    }
}

/// A toolset's own fine-grained, argument-aware opinion on an invocation.
///
/// Consulted by the approval gateway before any static configuration. A
/// `Blocked` verdict is final: it overrides static pre-approval and is never
/// shown to a decision provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOpinion {
    /// The invocation may proceed without a decision step.
    PreApproved,
    /// The invocation must not proceed, regardless of configuration.
    Blocked {
        /// Why the toolset refuses the invocation.
        reason: String,
    },
    /// The toolset defers to configuration and policy.
    NoOpinion,
}

/// A live, possibly stateful capability bound to tools.
///
/// Instances are created by the
/// [`InstanceProvider`](crate::InstanceProvider) and owned by exactly one
/// execution context unless their declared scope is shared. `cleanup` runs
/// exactly once per instance when its owning scope ends.
#[async_trait]
pub trait Toolset: Send + Sync {
    /// Toolset name.
    fn name(&self) -> &str;

    /// Tools this instance exposes.
    fn list_tools(&self) -> Vec<ToolDescriptor>;

    /// Invoke a tool by name.
    ///
    /// # Errors
    ///
    /// Returns a [`ToolsetError`](crate::ToolsetError) when the tool is
    /// unknown, the arguments are invalid, or execution fails. These are
    /// recoverable from the runtime's point of view: they surface to the
    /// model as error tool-results.
    async fn invoke(&self, tool: &str, args: &Value) -> ToolsetResult<String>;

    /// Argument-aware opinion on an invocation.
    ///
    /// The default implementation defers to configuration.
    fn opinion_on(&self, _tool: &str, _args: &Value) -> ToolOpinion {
        ToolOpinion::NoOpinion
    }

    /// Release any resources the instance holds.
    ///
    /// Called exactly once when the owning scope ends, on every exit path.
    async fn cleanup(&self) {}
}
