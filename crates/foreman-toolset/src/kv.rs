//! In-memory key-value toolset with explicit handles.
//!
//! A deliberately stateful capability: every piece of state lives behind a
//! handle the caller must open first. Two execution contexts holding
//! different instances therefore end up with disjoint handle maps, which is
//! exactly what the call-scope isolation guarantee promises.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{ToolsetError, ToolsetResult};
use crate::toolset::{ToolDescriptor, Toolset};

/// A stateful in-memory store keyed by caller-visible handles.
pub struct KvToolset {
    name: String,
    next_handle: AtomicUsize,
    stores: Mutex<HashMap<String, HashMap<String, String>>>,
}

impl KvToolset {
    /// Create an empty store toolset.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            next_handle: AtomicUsize::new(1),
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// Handles currently open in this instance.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn handles(&self) -> Vec<String> {
        let mut handles: Vec<String> = self
            .stores
            .lock()
            .expect("kv store mutex poisoned")
            .keys()
            .cloned()
            .collect();
        handles.sort();
        handles
    }

    fn require_str<'a>(args: &'a Value, field: &str) -> ToolsetResult<&'a str> {
        args.get(field)
            .and_then(Value::as_str)
            .ok_or_else(|| ToolsetError::InvalidArguments(format!("missing string field '{field}'")))
    }
}

#[async_trait]
impl Toolset for KvToolset {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_tools(&self) -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new("open", "Open a new store and return its handle"),
            ToolDescriptor::new("put", "Store a value under a key").with_schema(serde_json::json!({
                "type": "object",
                "required": ["handle", "key", "value"],
                "properties": {
                    "handle": {"type": "string"},
                    "key": {"type": "string"},
                    "value": {"type": "string"}
                }
            })),
            ToolDescriptor::new("get", "Read a value by key").with_schema(serde_json::json!({
                "type": "object",
                "required": ["handle", "key"],
                "properties": {
                    "handle": {"type": "string"},
                    "key": {"type": "string"}
                }
            })),
        ]
    }

    async fn invoke(&self, tool: &str, args: &Value) -> ToolsetResult<String> {
        let mut stores = self
            .stores
            .lock()
            .map_err(|_| ToolsetError::ExecutionFailed("kv store mutex poisoned".to_string()))?;

        match tool {
            "open" => {
                let id = self.next_handle.fetch_add(1, Ordering::SeqCst);
                let handle = format!("h{id}");
                stores.insert(handle.clone(), HashMap::new());
                Ok(handle)
            },
            "put" => {
                let handle = Self::require_str(args, "handle")?;
                let key = Self::require_str(args, "key")?;
                let value = Self::require_str(args, "value")?;
                let store = stores
                    .get_mut(handle)
                    .ok_or_else(|| ToolsetError::UnknownHandle(handle.to_string()))?;
                store.insert(key.to_string(), value.to_string());
                Ok(format!("stored {key}"))
            },
            "get" => {
                let handle = Self::require_str(args, "handle")?;
                let key = Self::require_str(args, "key")?;
                let store = stores
                    .get(handle)
                    .ok_or_else(|| ToolsetError::UnknownHandle(handle.to_string()))?;
                store.get(key).cloned().ok_or_else(|| {
                    ToolsetError::ExecutionFailed(format!("no value under key '{key}'"))
                })
            },
            other => Err(ToolsetError::UnknownTool(other.to_string())),
        }
    }
}
