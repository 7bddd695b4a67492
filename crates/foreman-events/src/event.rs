//! Event types for the Foreman event bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Metadata attached to every event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
    /// Name of the worker the event originated from.
    pub worker: String,
    /// Call depth of the originating execution context.
    pub depth: usize,
    /// Run ID, if known.
    pub run_id: Option<Uuid>,
}

impl EventMetadata {
    /// Create metadata for a worker at a depth.
    #[must_use]
    pub fn new(worker: impl Into<String>, depth: usize) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            worker: worker.into(),
            depth,
            run_id: None,
        }
    }

    /// Set the run ID.
    #[must_use]
    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }
}

/// All events the runtime can emit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    /// Input handed to a worker at the start of a turn.
    UserMessage {
        /// Event metadata.
        metadata: EventMetadata,
        /// The input text or serialized structured input.
        content: String,
    },

    /// A tool call was dispatched.
    ToolCall {
        /// Event metadata.
        metadata: EventMetadata,
        /// Tool call ID.
        call_id: String,
        /// Tool name.
        tool: String,
        /// Tool arguments.
        arguments: Value,
    },

    /// A tool call produced a result.
    ToolResult {
        /// Event metadata.
        metadata: EventMetadata,
        /// Tool call ID.
        call_id: String,
        /// Tool name.
        tool: String,
        /// Result content.
        content: String,
        /// Whether the result is an error.
        is_error: bool,
    },

    /// A tool invocation is waiting on an external approval decision.
    ApprovalRequested {
        /// Event metadata.
        metadata: EventMetadata,
        /// Approval request ID.
        request_id: Uuid,
        /// Tool name.
        tool: String,
    },

    /// A worker completed its turn.
    Completion {
        /// Event metadata.
        metadata: EventMetadata,
        /// Short summary of the final output.
        summary: String,
    },

    /// A worker failed.
    Error {
        /// Event metadata.
        metadata: EventMetadata,
        /// Error description.
        message: String,
    },
}

impl RuntimeEvent {
    /// Snake-case tag for this event, matching the serialized `type` field.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::UserMessage { .. } => "user_message",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::ApprovalRequested { .. } => "approval_requested",
            Self::Completion { .. } => "completion",
            Self::Error { .. } => "error",
        }
    }

    /// The event's metadata.
    #[must_use]
    pub fn metadata(&self) -> &EventMetadata {
        match self {
            Self::UserMessage { metadata, .. }
            | Self::ToolCall { metadata, .. }
            | Self::ToolResult { metadata, .. }
            | Self::ApprovalRequested { metadata, .. }
            | Self::Completion { metadata, .. }
            | Self::Error { metadata, .. } => metadata,
        }
    }
}
