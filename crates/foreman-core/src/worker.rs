//! Worker definitions.
//!
//! A [`WorkerSpec`] is the immutable, stateless description of one unit of
//! delegation: instructions, toolset references, schemas, and model
//! selection. Many execution contexts may reference the same spec
//! concurrently; per-invocation state lives entirely in the runtime.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

use crate::types::ToolsetRef;

/// Errors produced when validating a worker definition.
#[derive(Debug, Error)]
pub enum SpecError {
    /// The worker has no name.
    #[error("worker definition has an empty name")]
    EmptyName,

    /// The worker has no instructions.
    #[error("worker '{name}' has empty instructions")]
    EmptyInstructions {
        /// The worker name.
        name: String,
    },

    /// `compatible_models` was declared but empty.
    ///
    /// `None` means "any model allowed"; an explicit empty list can never
    /// match and is a configuration mistake, not a restriction.
    #[error("worker '{name}' declares an empty compatible_models list")]
    EmptyCompatibleModels {
        /// The worker name.
        name: String,
    },
}

/// Per-worker approval configuration.
///
/// Maps tool names to a static `pre_approved` flag. Tools absent from the
/// map require approval. The configuration belongs to the worker that
/// declares it and is never inherited from a calling worker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerApprovalConfig {
    /// Static per-tool pre-approval flags.
    pre_approved: HashMap<String, bool>,
}

impl WorkerApprovalConfig {
    /// Create an empty configuration (everything requires approval).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a tool as pre-approved.
    #[must_use]
    pub fn allow(mut self, tool: impl Into<String>) -> Self {
        self.pre_approved.insert(tool.into(), true);
        self
    }

    /// Mark a tool as explicitly requiring approval.
    #[must_use]
    pub fn require(mut self, tool: impl Into<String>) -> Self {
        self.pre_approved.insert(tool.into(), false);
        self
    }

    /// Look up the static flag for a tool, if one was configured.
    #[must_use]
    pub fn pre_approved(&self, tool: &str) -> Option<bool> {
        self.pre_approved.get(tool).copied()
    }
}

/// An immutable worker definition.
///
/// Produced by an external loader; the runtime never parses definition
/// files. The `name` doubles as the worker's tool name when it is exposed
/// to a calling worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSpec {
    /// Worker name; also its tool name when called by another worker.
    pub name: String,
    /// System instructions for the worker's agent turn.
    pub instructions: String,
    /// Named toolset references resolved at invocation time.
    pub toolsets: Vec<ToolsetRef>,
    /// Optional JSON schema for the worker's input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
    /// Optional JSON schema for the worker's output. When present, the
    /// worker's final answer is expected to parse as JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    /// Preferred model, overridable by the run configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_preference: Option<String>,
    /// Allow-list of models this worker may run on. `None` = any model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatible_models: Option<Vec<String>>,
    /// This worker's own approval configuration.
    #[serde(default)]
    pub approval: WorkerApprovalConfig,
}

impl WorkerSpec {
    /// Create a minimal spec with a name and instructions.
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            toolsets: Vec::new(),
            input_schema: None,
            output_schema: None,
            model_preference: None,
            compatible_models: None,
            approval: WorkerApprovalConfig::default(),
        }
    }

    /// Add a toolset reference.
    #[must_use]
    pub fn with_toolset(mut self, toolset: impl Into<ToolsetRef>) -> Self {
        self.toolsets.push(toolset.into());
        self
    }

    /// Set the input schema.
    #[must_use]
    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    /// Set the output schema.
    #[must_use]
    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Set the preferred model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_preference = Some(model.into());
        self
    }

    /// Restrict the worker to an allow-list of models.
    #[must_use]
    pub fn with_compatible_models(mut self, models: Vec<String>) -> Self {
        self.compatible_models = Some(models);
        self
    }

    /// Set the approval configuration.
    #[must_use]
    pub fn with_approval(mut self, approval: WorkerApprovalConfig) -> Self {
        self.approval = approval;
        self
    }

    /// Validate structural invariants of the definition.
    ///
    /// # Errors
    ///
    /// Returns a [`SpecError`] if the name or instructions are empty, or if
    /// `compatible_models` is declared but empty.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.name.trim().is_empty() {
            return Err(SpecError::EmptyName);
        }
        if self.instructions.trim().is_empty() {
            return Err(SpecError::EmptyInstructions {
                name: self.name.clone(),
            });
        }
        if matches!(&self.compatible_models, Some(models) if models.is_empty()) {
            return Err(SpecError::EmptyCompatibleModels {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Whether `model` satisfies this worker's allow-list.
    #[must_use]
    pub fn accepts_model(&self, model: &str) -> bool {
        match &self.compatible_models {
            None => true,
            Some(models) => models.iter().any(|m| m == model),
        }
    }
}
