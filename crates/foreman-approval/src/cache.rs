//! Run-wide session decision cache.

use dashmap::DashMap;

use crate::request::{ApprovalDecision, Remember};

/// Cache of session-remembered decisions, keyed by
/// `(tool name, canonicalized arguments)`.
///
/// Lives for one run. A hit skips the decision step entirely, for approvals
/// and denials alike.
#[derive(Debug, Default)]
pub struct DecisionCache {
    entries: DashMap<(String, String), ApprovalDecision>,
}

impl DecisionCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a remembered decision.
    #[must_use]
    pub fn get(&self, key: &(String, String)) -> Option<ApprovalDecision> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Remember a decision if it asked to be remembered.
    pub fn remember(&self, key: (String, String), decision: &ApprovalDecision) {
        if decision.remember == Remember::Session {
            self.entries.insert(key, decision.clone());
        }
    }

    /// Number of remembered decisions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
