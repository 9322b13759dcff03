use crate::cancellation::{CancelReason, CancellationSignal};
use std::time::Instant;

/// A registered, cancellable request. Clones share the same signal.
#[derive(Debug, Clone)]
pub struct RequestHandle {
    id: String,
    generation: u64,
    signal: CancellationSignal,
    /// Stops the timeout watcher once the request settles. Never visible to
    /// the operation.
    watch: CancellationSignal,
    created_at: Instant,
}

impl RequestHandle {
    pub(super) fn new(id: &str, generation: u64) -> Self {
        Self {
            id: id.to_string(),
            generation,
            signal: CancellationSignal::new(),
            watch: CancellationSignal::new(),
            created_at: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn signal(&self) -> &CancellationSignal {
        &self.signal
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn cancel(&self) {
        self.signal.cancel();
    }

    pub(super) fn cancel_with(&self, reason: CancelReason) {
        self.signal.cancel_with(reason);
    }

    pub(super) fn watch(&self) -> &CancellationSignal {
        &self.watch
    }

    /// Retire the timeout watcher without touching the request's own signal.
    pub(super) fn settle(&self) {
        self.watch.cancel();
    }
}

/// Pending trailing-edge timer for one request id.
#[derive(Debug)]
pub(super) struct DebounceEntry {
    pub(super) generation: u64,
    pub(super) timer: CancellationSignal,
}
