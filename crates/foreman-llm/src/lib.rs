//! Foreman LLM - Language-model client contract.
//!
//! This crate defines the input/output contract the runtime has with a
//! language model: conversation [`Message`]s, [`ToolDefinition`]s offered to
//! the model, and the [`ModelResponse`] a provider returns for one agent
//! turn. Wire protocols and streaming mechanics live in provider crates
//! outside this workspace; the runtime reaches a provider exactly once per
//! agent turn and treats it as opaque.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod provider;
mod types;

pub use error::{LlmError, LlmResult};
pub use provider::ModelProvider;
pub use types::{
    Message, MessageContent, MessageRole, ModelResponse, StopReason, ToolCall, ToolCallResult,
    ToolDefinition, Usage,
};
