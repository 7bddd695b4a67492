//! Approval-wrapped toolset instances.

use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use foreman_toolset::{ToolDescriptor, Toolset, ToolsetError};

use crate::error::ApprovalError;
use crate::gate::{ApprovalGate, ApprovalProof};

/// Error from a gated invocation: the gate refused, or the tool itself
/// failed after authorization.
#[derive(Debug, Error)]
pub enum GatedCallError {
    /// The gate refused the invocation.
    #[error(transparent)]
    Approval(#[from] ApprovalError),

    /// The tool ran and failed.
    #[error(transparent)]
    Toolset(#[from] ToolsetError),
}

impl GatedCallError {
    /// Whether this error aborts the run rather than surfacing to the model.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Approval(error) => error.is_fatal(),
            Self::Toolset(_) => false,
        }
    }
}

/// A toolset instance whose every invocation passes the approval gate.
///
/// The wrapped instance's own `opinion_on` is consulted first on each call,
/// so argument-aware pre-approvals and blocks always reach the gate.
pub struct GatedToolset {
    inner: Arc<dyn Toolset>,
    gate: Arc<ApprovalGate>,
}

impl GatedToolset {
    /// Wrap an instance behind a gate.
    #[must_use]
    pub fn new(inner: Arc<dyn Toolset>, gate: Arc<ApprovalGate>) -> Self {
        Self { inner, gate }
    }

    /// The wrapped instance's name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Tools the wrapped instance exposes.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.inner.list_tools()
    }

    /// The wrapped instance, for ownership bookkeeping.
    #[must_use]
    pub fn inner(&self) -> &Arc<dyn Toolset> {
        &self.inner
    }

    /// Invoke a tool through the gate.
    ///
    /// # Errors
    ///
    /// Returns [`GatedCallError::Approval`] when the gate refuses, or
    /// [`GatedCallError::Toolset`] when the authorized tool fails.
    pub async fn invoke(&self, tool: &str, args: &Value) -> Result<String, GatedCallError> {
        let opinion = self.inner.opinion_on(tool, args);
        let _proof: ApprovalProof = self.gate.authorize(tool, args, opinion).await?;
        Ok(self.inner.invoke(tool, args).await?)
    }
}
