//! Approval request and decision types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an approval request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Create a new random request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req:{}", self.0)
    }
}

/// A request for a decision on one tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Unique request identifier.
    pub id: RequestId,
    /// Worker that wants to perform the invocation.
    pub worker: String,
    /// Call depth of the requesting context.
    pub depth: usize,
    /// Tool name.
    pub tool: String,
    /// Tool arguments.
    pub arguments: Value,
    /// When the request was created.
    pub created_at: DateTime<Utc>,
}

impl ApprovalRequest {
    /// Create a new request.
    #[must_use]
    pub fn new(worker: impl Into<String>, depth: usize, tool: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: RequestId::new(),
            worker: worker.into(),
            depth,
            tool: tool.into(),
            arguments,
            created_at: Utc::now(),
        }
    }

    /// Canonical cache key for this request's tool and arguments.
    #[must_use]
    pub fn cache_key(&self) -> (String, String) {
        (self.tool.clone(), canonicalize_args(&self.arguments))
    }
}

impl fmt::Display for ApprovalRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} wants to call '{}' (depth {})", self.worker, self.tool, self.depth)
    }
}

/// How long a decision should be remembered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Remember {
    /// Decide this invocation only.
    #[default]
    None,
    /// Cache the decision for the rest of the run, keyed by
    /// (tool name, canonicalized arguments).
    Session,
}

/// The decision made on an approval request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalDecision {
    /// Whether the invocation may proceed.
    pub approved: bool,
    /// Optional note from the decider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Whether to remember this decision.
    #[serde(default)]
    pub remember: Remember,
}

impl ApprovalDecision {
    /// A one-time approval.
    #[must_use]
    pub fn approve() -> Self {
        Self {
            approved: true,
            note: None,
            remember: Remember::None,
        }
    }

    /// A denial with a reason.
    #[must_use]
    pub fn deny(note: impl Into<String>) -> Self {
        Self {
            approved: false,
            note: Some(note.into()),
            remember: Remember::None,
        }
    }

    /// Set the remember scope.
    #[must_use]
    pub fn with_remember(mut self, remember: Remember) -> Self {
        self.remember = remember;
        self
    }

    /// Attach a note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Canonicalize tool arguments for cache keying.
///
/// Objects are re-serialized with keys sorted recursively, so two argument
/// values that differ only in key order produce the same key.
#[must_use]
pub fn canonicalize_args(args: &Value) -> String {
    fn write(value: &Value, out: &mut String) {
        match value {
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                out.push('{');
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    // Object keys serialize as plain JSON strings.
                    out.push_str(&Value::String((*key).clone()).to_string());
                    out.push(':');
                    if let Some(v) = map.get(*key) {
                        write(v, out);
                    }
                }
                out.push('}');
            },
            Value::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    write(item, out);
                }
                out.push(']');
            },
            other => out.push_str(&other.to_string()),
        }
    }

    let mut out = String::new();
    write(args, &mut out);
    out
}
