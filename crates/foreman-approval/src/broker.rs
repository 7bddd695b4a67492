//! Suspension broker for interactive approvals.
//!
//! When a decision provider answers `Pending`, the gateway hands the request
//! to an external consumer through this broker and awaits the reply on a
//! oneshot channel. The calling task does no other work while suspended;
//! independent execution contexts elsewhere in the run keep progressing.
//!
//! Cancelling a suspended wait retracts the request from the consumer's
//! queue so stale requests never linger.

use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::request::{ApprovalDecision, ApprovalRequest, RequestId};

struct PendingEntry {
    request: ApprovalRequest,
    responder: oneshot::Sender<ApprovalDecision>,
}

/// Broker holding suspended approval requests.
pub struct ApprovalBroker {
    pending: Mutex<HashMap<RequestId, PendingEntry>>,
    queue_tx: mpsc::UnboundedSender<ApprovalRequest>,
    queue_rx: Mutex<Option<mpsc::UnboundedReceiver<ApprovalRequest>>>,
}

impl ApprovalBroker {
    /// Create a new broker.
    #[must_use]
    pub fn new() -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        Self {
            pending: Mutex::new(HashMap::new()),
            queue_tx,
            queue_rx: Mutex::new(Some(queue_rx)),
        }
    }

    /// Take the request queue. The external consumer calls this once and
    /// then drains requests as they arrive.
    #[must_use]
    pub fn take_requests(&self) -> Option<PendingRequests> {
        self.queue_rx
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
            .map(|receiver| PendingRequests { receiver })
    }

    /// Suspend a request: register it and hand it to the consumer queue.
    ///
    /// Returns the channel the decision will arrive on. If the broker is
    /// dropped before a decision is posted, the receiver resolves with an
    /// error, which callers treat as a denial.
    pub fn suspend(&self, request: ApprovalRequest) -> oneshot::Receiver<ApprovalDecision> {
        let (responder, receiver) = oneshot::channel();
        let id = request.id.clone();

        debug!(request = %id, tool = %request.tool, "Suspending for external decision");

        self.pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(
                id,
                PendingEntry {
                    request: request.clone(),
                    responder,
                },
            );

        // The consumer may not be attached; the request stays listable via
        // `pending()` and resolvable by ID either way.
        let _ = self.queue_tx.send(request);

        receiver
    }

    /// Post a decision for a suspended request.
    ///
    /// Returns `false` if the request is unknown or already retracted.
    pub fn resolve(&self, id: &RequestId, decision: ApprovalDecision) -> bool {
        let entry = self
            .pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(id);

        match entry {
            Some(entry) => entry.responder.send(decision).is_ok(),
            None => false,
        }
    }

    /// Retract a suspended request (the waiting task was cancelled).
    ///
    /// Returns the retracted request, if it was still pending.
    pub fn retract(&self, id: &RequestId) -> Option<ApprovalRequest> {
        let entry = self
            .pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(id);
        if entry.is_some() {
            debug!(request = %id, "Retracted pending approval request");
        }
        entry.map(|e| e.request)
    }

    /// Snapshot of currently suspended requests.
    #[must_use]
    pub fn pending(&self) -> Vec<ApprovalRequest> {
        self.pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .map(|entry| entry.request.clone())
            .collect()
    }

    /// Number of currently suspended requests.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

impl Default for ApprovalBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ApprovalBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalBroker")
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

/// The external consumer's end of the request queue.
pub struct PendingRequests {
    receiver: mpsc::UnboundedReceiver<ApprovalRequest>,
}

impl PendingRequests {
    /// Receive the next suspended request.
    ///
    /// Returns `None` when the broker is dropped.
    pub async fn recv(&mut self) -> Option<ApprovalRequest> {
        self.receiver.recv().await
    }

    /// Receive without waiting.
    pub fn try_recv(&mut self) -> Option<ApprovalRequest> {
        self.receiver.try_recv().ok()
    }
}
