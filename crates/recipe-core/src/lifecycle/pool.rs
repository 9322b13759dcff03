use super::Shared;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Counted slots plus the FIFO of starts waiting for one.
///
/// A queued start is not counted. When a slot frees it is handed straight to
/// the oldest live waiter, so `active` only drops when nobody is waiting.
pub(super) struct ConcurrencyPool {
    pub(super) active: usize,
    pub(super) max_concurrent: usize,
    pub(super) queue: VecDeque<QueuedStart>,
}

pub(super) struct QueuedStart {
    pub(super) id: String,
    pub(super) generation: u64,
    pub(super) start: oneshot::Sender<SlotPermit>,
}

pub(super) enum Acquire {
    Ready(SlotPermit),
    Queued(oneshot::Receiver<SlotPermit>),
}

impl ConcurrencyPool {
    pub(super) fn new(max_concurrent: usize) -> Self {
        Self {
            active: 0,
            max_concurrent: max_concurrent.max(1),
            queue: VecDeque::new(),
        }
    }

    pub(super) fn is_saturated(&self) -> bool {
        self.active >= self.max_concurrent
    }

    pub(super) fn drop_queued(&mut self, id: &str) -> usize {
        let before = self.queue.len();
        self.queue.retain(|waiter| waiter.id != id);
        before - self.queue.len()
    }

    pub(super) fn drop_queued_generation(&mut self, id: &str, generation: u64) {
        self.queue
            .retain(|waiter| !(waiter.id == id && waiter.generation == generation));
    }
}

/// Ownership of one concurrency slot. Dropping it frees the slot.
pub(super) struct SlotPermit {
    shared: Option<Arc<Shared>>,
}

impl SlotPermit {
    pub(super) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared: Some(shared),
        }
    }

    /// Forget the slot without releasing it. Used when a hand-off failed and
    /// the releaser keeps the slot for the next waiter.
    pub(super) fn disarm(&mut self) {
        self.shared = None;
    }
}

impl Drop for SlotPermit {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.release_slot();
        }
    }
}
