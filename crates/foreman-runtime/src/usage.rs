//! Run-wide usage accounting.

use chrono::{DateTime, Utc};
use std::sync::Mutex;

use foreman_llm::Usage;

/// One per-call accounting entry.
#[derive(Debug, Clone)]
pub struct UsageRecord {
    /// Worker the tokens were spent for.
    pub worker: String,
    /// Call depth of the spending context.
    pub depth: usize,
    /// Model the turn ran on.
    pub model: String,
    /// Token usage of the turn.
    pub usage: Usage,
    /// When the record was appended.
    pub recorded_at: DateTime<Utc>,
}

impl UsageRecord {
    /// Create a record stamped with the current time.
    #[must_use]
    pub fn new(worker: impl Into<String>, depth: usize, model: impl Into<String>, usage: Usage) -> Self {
        Self {
            worker: worker.into(),
            depth,
            model: model.into(),
            usage,
            recorded_at: Utc::now(),
        }
    }
}

/// Append-only usage collector shared by every context in a run.
///
/// The one genuinely concurrent piece of mutable run state; internally
/// synchronized, injected via the run configuration, never ambient.
#[derive(Debug, Default)]
pub struct UsageCollector {
    records: Mutex<Vec<UsageRecord>>,
}

impl UsageCollector {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record.
    pub fn record(&self, record: UsageRecord) {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(record);
    }

    /// Snapshot of all records so far, in append order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<UsageRecord> {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Aggregated token totals.
    #[must_use]
    pub fn totals(&self) -> Usage {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .fold(Usage::default(), |acc, record| acc.add(record.usage))
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Whether any usage was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
