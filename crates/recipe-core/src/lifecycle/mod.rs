//! Request lifecycle management.
//!
//! One manager owns three pieces of bookkeeping:
//! - a registry with at most one live [`RequestHandle`] per logical id,
//! - one trailing-edge debounce timer per id,
//! - a bounded concurrency pool with a FIFO queue of waiting starts.
//!
//! Clones share all three, so a single manager constructed at startup is the
//! process-wide pool. Every mutation happens under one mutex that is never
//! held across an `.await`.

mod pool;
mod registry;

pub use registry::RequestHandle;

use crate::cancellation::{CancelReason, CancellationSignal};
use crate::error::SearchError;
use pool::{Acquire, ConcurrencyPool, QueuedStart, SlotPermit};
use registry::DebounceEntry;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 3;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleOptions {
    pub max_concurrent: usize,
    pub request_timeout: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT_REQUESTS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Clone)]
pub struct RequestLifecycleManager {
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    state: Mutex<ManagerState>,
    options: LifecycleOptions,
}

struct ManagerState {
    handles: HashMap<String, RequestHandle>,
    debounces: HashMap<String, DebounceEntry>,
    pool: ConcurrencyPool,
    next_generation: u64,
}

impl ManagerState {
    fn allocate_generation(&mut self) -> u64 {
        let generation = self.next_generation;
        self.next_generation = self.next_generation.wrapping_add(1).max(1);
        generation
    }

    /// Cancel everything known about `id`: timer, live handle, queued start.
    fn cancel_id(&mut self, id: &str, reason: CancelReason) -> bool {
        let mut touched = false;
        if let Some(entry) = self.debounces.remove(id) {
            entry.timer.cancel_with(reason);
            touched = true;
        }
        if let Some(handle) = self.handles.remove(id) {
            handle.cancel_with(reason);
            touched = true;
        }
        touched |= self.pool.drop_queued(id) > 0;
        touched
    }

    fn register_handle(&mut self, id: &str) -> RequestHandle {
        let generation = self.allocate_generation();
        let handle = RequestHandle::new(id, generation);
        if let Some(previous) = self.handles.insert(id.to_string(), handle.clone()) {
            previous.cancel_with(CancelReason::Superseded);
            self.pool.drop_queued_generation(id, previous.generation());
            debug!(
                id,
                previous_generation = previous.generation(),
                generation,
                "Superseded live request handle"
            );
        }
        handle
    }

    /// Claim the debounce entry for a timer that just fired. Fails when the
    /// timer was cleared or replaced while it was sleeping.
    fn take_debounce(&mut self, id: &str, generation: u64) -> Result<(), CancelReason> {
        match self.debounces.get(id) {
            Some(entry) if entry.generation == generation => {
                if let Some(reason) = entry.timer.reason() {
                    return Err(reason);
                }
                self.debounces.remove(id);
                Ok(())
            }
            _ => Err(CancelReason::Superseded),
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_acquire(self: &Arc<Self>, state: &mut ManagerState, handle: &RequestHandle) -> Acquire {
        if !state.pool.is_saturated() {
            state.pool.active += 1;
            return Acquire::Ready(SlotPermit::new(Arc::clone(self)));
        }
        let (start, receiver) = oneshot::channel();
        state.pool.queue.push_back(QueuedStart {
            id: handle.id().to_string(),
            generation: handle.generation(),
            start,
        });
        debug!(
            id = handle.id(),
            active = state.pool.active,
            queued = state.pool.queue.len(),
            "Concurrency pool saturated; request queued"
        );
        Acquire::Queued(receiver)
    }

    pub(super) fn release_slot(self: &Arc<Self>) {
        let mut state = self.lock();
        while let Some(waiter) = state.pool.queue.pop_front() {
            let QueuedStart {
                id,
                generation,
                start,
            } = waiter;
            match start.send(SlotPermit::new(Arc::clone(self))) {
                Ok(()) => {
                    debug!(id, generation, "Handed freed slot to queued request");
                    return;
                }
                Err(mut permit) => permit.disarm(),
            }
        }
        state.pool.active = state.pool.active.saturating_sub(1);
    }

    fn release_handle(&self, id: &str, generation: u64) {
        let mut state = self.lock();
        if state
            .handles
            .get(id)
            .is_some_and(|handle| handle.generation() == generation)
        {
            if let Some(handle) = state.handles.remove(id) {
                handle.settle();
            }
        }
        state.pool.drop_queued_generation(id, generation);
    }
}

impl Default for RequestLifecycleManager {
    fn default() -> Self {
        Self::new(LifecycleOptions::default())
    }
}

impl RequestLifecycleManager {
    pub fn new(options: LifecycleOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ManagerState {
                    handles: HashMap::new(),
                    debounces: HashMap::new(),
                    pool: ConcurrencyPool::new(options.max_concurrent),
                    next_generation: 1,
                }),
                options,
            }),
        }
    }

    pub fn options(&self) -> LifecycleOptions {
        self.shared.options
    }

    /// Register a fresh handle for `id`, cancelling any live one.
    ///
    /// The handle carries an absolute timeout; when it expires the signal is
    /// cancelled with [`CancelReason::Timeout`] and the registry entry is
    /// dropped. Must be called from within a Tokio runtime.
    pub fn create_request(&self, id: &str) -> RequestHandle {
        let handle = self.shared.lock().register_handle(id);
        self.spawn_timeout(&handle);
        handle
    }

    /// Drop the registry entry for a handle whose operation has settled and
    /// stop its timeout. A newer handle registered under the same id is left
    /// alone.
    pub fn finish_request(&self, handle: &RequestHandle) {
        handle.settle();
        self.shared.release_handle(handle.id(), handle.generation());
    }

    /// Run `operation` after `delay` of quiescence for `id`.
    ///
    /// Any pending timer, live handle, or queued start for `id` is cancelled
    /// first, so within a burst only the last call ever executes. When the
    /// timer fires the start competes for a concurrency slot and waits in the
    /// FIFO queue if the pool is saturated. The work runs on a spawned task;
    /// dropping the returned future does not cancel it.
    pub fn debounced_request<T, F, Fut>(
        &self,
        id: &str,
        delay: Duration,
        operation: F,
    ) -> PendingRequest<T>
    where
        T: Send + 'static,
        F: FnOnce(CancellationSignal) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, SearchError>> + Send + 'static,
    {
        let (generation, timer) = {
            let mut state = self.shared.lock();
            if state.cancel_id(id, CancelReason::Superseded) {
                debug!(id, "Debounced request superseded earlier call");
            }
            let generation = state.allocate_generation();
            let timer = CancellationSignal::new();
            state.debounces.insert(
                id.to_string(),
                DebounceEntry {
                    generation,
                    timer: timer.clone(),
                },
            );
            (generation, timer)
        };

        let manager = self.clone();
        let id = id.to_string();
        let task = tokio::spawn(async move {
            tokio::select! {
                reason = timer.cancelled() => return Err(SearchError::aborted(reason)),
                _ = tokio::time::sleep(delay) => {}
            }

            let (handle, acquire) = {
                let mut state = manager.shared.lock();
                if let Err(reason) = state.take_debounce(&id, generation) {
                    return Err(SearchError::aborted(reason));
                }
                let handle = state.register_handle(&id);
                let acquire = manager.shared.try_acquire(&mut state, &handle);
                (handle, acquire)
            };
            manager.spawn_timeout(&handle);
            manager.run_acquired(handle, acquire, operation).await
        });

        PendingRequest { task }
    }

    /// Run `operation` without a debounce window.
    ///
    /// The slot is claimed (or the start queued) before this returns, so
    /// queued work starts in exactly the order of these calls.
    pub fn execute_request<T, F, Fut>(&self, id: &str, operation: F) -> PendingRequest<T>
    where
        T: Send + 'static,
        F: FnOnce(CancellationSignal) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, SearchError>> + Send + 'static,
    {
        let (handle, acquire) = {
            let mut state = self.shared.lock();
            state.cancel_id(id, CancelReason::Superseded);
            let handle = state.register_handle(id);
            let acquire = self.shared.try_acquire(&mut state, &handle);
            (handle, acquire)
        };
        self.spawn_timeout(&handle);

        let manager = self.clone();
        let task =
            tokio::spawn(async move { manager.run_acquired(handle, acquire, operation).await });
        PendingRequest { task }
    }

    /// Cancel the live handle, pending timer, and queued start for `id`.
    pub fn cancel_request(&self, id: &str) {
        if self.shared.lock().cancel_id(id, CancelReason::Explicit) {
            info!(id, "Cancelled request");
        }
    }

    /// Cancel everything this manager knows about. Used as the teardown hook
    /// when the owning view goes away.
    pub fn cancel_all_requests(&self) {
        let mut state = self.shared.lock();
        let timers = state.debounces.len();
        let handles = state.handles.len();
        let queued = state.pool.queue.len();
        for (_, entry) in state.debounces.drain() {
            entry.timer.cancel_with(CancelReason::Shutdown);
        }
        for (_, handle) in state.handles.drain() {
            handle.cancel_with(CancelReason::Shutdown);
        }
        state.pool.queue.clear();
        info!(timers, handles, queued, "Cancelled all requests");
    }

    pub fn active_count(&self) -> usize {
        self.shared.lock().pool.active
    }

    pub fn queued_count(&self) -> usize {
        self.shared.lock().pool.queue.len()
    }

    pub fn pending_debounce_count(&self) -> usize {
        self.shared.lock().debounces.len()
    }

    pub fn has_request(&self, id: &str) -> bool {
        self.shared.lock().handles.contains_key(id)
    }

    pub fn registered_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.shared.lock().handles.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn spawn_timeout(&self, handle: &RequestHandle) {
        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        let timeout = self.shared.options.request_timeout;
        let signal = handle.signal().clone();
        let watch = handle.watch().clone();
        let id = handle.id().to_string();
        let generation = handle.generation();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = watch.cancelled() => return,
                _ = signal.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    signal.cancel_with(CancelReason::Timeout);
                    warn!(id, timeout_secs = timeout.as_secs_f64(), "Request timed out");
                }
            }
            if let Some(shared) = shared.upgrade() {
                shared.release_handle(&id, generation);
            }
        });
    }

    async fn run_acquired<T, F, Fut>(
        &self,
        handle: RequestHandle,
        acquire: Acquire,
        operation: F,
    ) -> Result<T, SearchError>
    where
        F: FnOnce(CancellationSignal) -> Fut,
        Fut: Future<Output = Result<T, SearchError>>,
    {
        let signal = handle.signal().clone();
        let permit = match acquire {
            Acquire::Ready(permit) => permit,
            Acquire::Queued(receiver) => {
                let started = tokio::select! {
                    reason = signal.cancelled() => Err(reason),
                    started = receiver => started.map_err(|_| {
                        signal.reason().unwrap_or(CancelReason::Explicit)
                    }),
                };
                match started {
                    Ok(permit) => permit,
                    Err(reason) => {
                        self.finish_request(&handle);
                        return Err(SearchError::aborted(reason));
                    }
                }
            }
        };

        let outcome = match signal.check_cancelled("slot_acquired") {
            Err(err) => Err(err),
            Ok(()) => {
                let result = tokio::select! {
                    biased;
                    reason = signal.cancelled() => Err(SearchError::aborted(reason)),
                    result = operation(signal.clone()) => result,
                };
                match signal.reason() {
                    Some(reason) => Err(SearchError::aborted(reason)),
                    None => result,
                }
            }
        };

        drop(permit);
        self.finish_request(&handle);
        outcome
    }
}

/// Eventual outcome of a lifecycle-managed request.
pub struct PendingRequest<T> {
    task: JoinHandle<Result<T, SearchError>>,
}

impl<T> Future for PendingRequest<T> {
    type Output = Result<T, SearchError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.task).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(err)) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Poll::Ready(Err(_)) => Poll::Ready(Err(SearchError::aborted(CancelReason::Shutdown))),
        }
    }
}
