//! Identifiers, toolset references, and run-wide value types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a single top-level run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new random run ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run:{}", self.0)
    }
}

/// A named reference to a toolset.
///
/// References are opaque names; the instance provider decides whether a name
/// resolves to a capability toolset or to another worker exposed as a tool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolsetRef(String);

impl ToolsetRef {
    /// Create a reference from a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The referenced name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ToolsetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ToolsetRef {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ToolsetRef {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Lifetime scope of a toolset instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolsetScope {
    /// Fresh instance per execution context, destroyed when the call ends.
    ///
    /// The default for stateful capabilities: two contexts never share a
    /// call-scoped instance, even for the same named toolset.
    Call,
    /// One instance shared by all contexts in a run, destroyed at run end.
    Run,
    /// One instance for the process lifetime. For genuinely stateless
    /// capabilities only.
    Process,
}

impl ToolsetScope {
    /// Whether instances of this scope are shared between contexts.
    #[must_use]
    pub fn is_shared(self) -> bool {
        matches!(self, Self::Run | Self::Process)
    }
}

impl std::fmt::Display for ToolsetScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "call"),
            Self::Run => write!(f, "run"),
            Self::Process => write!(f, "process"),
        }
    }
}

/// How chatty the runtime's event stream is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// Completions and errors only.
    Quiet,
    /// Plus inputs, tool calls, and summarized tool results.
    #[default]
    Normal,
    /// Full tool-result payloads in events.
    Verbose,
}
