//! Per-request dispatch state and cooperative cancellation

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

/// State threaded through one recursion path of a dispatch.
///
/// Created fresh per top-level request and never stored anywhere shared.
/// Each child context is derived from its parent, so sibling branches start
/// from the same visited set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchContext {
    /// Id of the top-level request, shared by every sub-turn
    pub request_id: Uuid,
    /// Descriptor id of the participant running this turn
    pub participant_id: String,
    /// Participants already dispatched on this path
    pub visited: BTreeSet<String>,
    /// Automatic handoffs taken to reach this turn
    pub depth: usize,
}

impl DispatchContext {
    /// Context for a top-level request
    pub fn root(participant_id: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            participant_id: participant_id.into(),
            visited: BTreeSet::new(),
            depth: 0,
        }
    }

    /// Context for an automatic handoff to `target`
    pub fn child(&self, target: impl Into<String>) -> Self {
        let mut visited = self.visited.clone();
        visited.insert(self.participant_id.clone());
        Self {
            request_id: self.request_id,
            participant_id: target.into(),
            visited,
            depth: self.depth + 1,
        }
    }

    /// Whether `id` was already dispatched on this path
    pub fn has_visited(&self, id: &str) -> bool {
        self.visited.contains(id)
    }

    /// Whether dispatching `id` would repeat a participant on this path
    pub fn on_path(&self, id: &str) -> bool {
        self.participant_id == id || self.has_visited(id)
    }
}

/// Cooperative cancellation flag shared between a host and a dispatch.
///
/// A `watch` channel carries the flag so any number of waiters can observe
/// the change, including ones that subscribe after it happened.
#[derive(Clone)]
pub struct CancelSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        let changed = self.tx.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        });
        if changed {
            debug!("Cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so the wait cannot fail.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelSignal")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
