//! Model provider trait.
//!
//! The single seam between the runtime and a concrete model backend.

use async_trait::async_trait;

use crate::error::LlmResult;
use crate::types::{Message, ModelResponse, ToolDefinition};

/// A language-model backend.
///
/// The runtime calls [`complete`](Self::complete) once per agent turn with
/// the worker's conversation so far, the tool definitions available to it,
/// and its rendered instructions. The provider answers with either a final
/// text message or a set of tool calls.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name, for diagnostics.
    fn name(&self) -> &str;

    /// Run one agent turn against `model`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot produce a response; the
    /// runtime treats this as fatal for the enclosing call.
    async fn complete(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        system: &str,
    ) -> LlmResult<ModelResponse>;
}

/// Blanket implementation so `Box<dyn ModelProvider>` satisfies bounds that
/// take a concrete `P: ModelProvider`.
#[async_trait]
impl ModelProvider for Box<dyn ModelProvider> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn complete(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        system: &str,
    ) -> LlmResult<ModelResponse> {
        (**self).complete(model, messages, tools, system).await
    }
}
