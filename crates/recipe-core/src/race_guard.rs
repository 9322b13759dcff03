//! Last-issued-wins commit discipline.
//!
//! Every guarded call takes a ticket when it is issued. Its outcome is only
//! handed back if no newer ticket was issued while it was in flight, no matter
//! which reply arrives first.

use crate::error::SearchError;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

impl Ticket {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct RaceGuard {
    latest_issued: Arc<AtomicU64>,
}

impl RaceGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> Ticket {
        Ticket(self.latest_issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.latest_issued.load(Ordering::SeqCst) == ticket.0
    }

    pub fn latest(&self) -> Ticket {
        Ticket(self.latest_issued.load(Ordering::SeqCst))
    }

    /// Guard `operation`. The ticket is taken here, at call time, not when
    /// the returned future is first polled.
    pub fn safeguard<T, Fut>(
        &self,
        operation: Fut,
    ) -> impl Future<Output = Result<T, SearchError>> + use<T, Fut>
    where
        Fut: Future<Output = Result<T, SearchError>>,
    {
        let (_, guarded) = self.safeguard_ticketed(operation);
        guarded
    }

    /// Like [`RaceGuard::safeguard`] but also returns the ticket, for callers
    /// that re-check currency when they commit the result later.
    pub fn safeguard_ticketed<T, Fut>(
        &self,
        operation: Fut,
    ) -> (
        Ticket,
        impl Future<Output = Result<T, SearchError>> + use<T, Fut>,
    )
    where
        Fut: Future<Output = Result<T, SearchError>>,
    {
        let ticket = self.issue();
        let guard = self.clone();
        let guarded = async move {
            let outcome = operation.await;
            if guard.is_current(ticket) {
                outcome
            } else {
                tracing::debug!(
                    ticket = ticket.value(),
                    latest = guard.latest().value(),
                    "Discarding outdated result"
                );
                Err(SearchError::Outdated)
            }
        };
        (ticket, guarded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn slower_older_reply_is_rejected_as_outdated() {
        let guard = RaceGuard::new();

        let first = guard.safeguard(async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok("old query")
        });
        let second = guard.safeguard(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok("new query")
        });

        let (first, second) = tokio::join!(first, second);

        assert_eq!(first, Err(SearchError::Outdated));
        assert_eq!(second, Ok("new query"));
    }

    #[tokio::test]
    async fn errors_from_the_current_call_pass_through() {
        let guard = RaceGuard::new();
        let outcome = guard
            .safeguard(async { Err::<(), _>(SearchError::malformed("not json")) })
            .await;
        assert_eq!(outcome, Err(SearchError::malformed("not json")));
    }

    #[tokio::test]
    async fn errors_from_stale_calls_are_replaced_by_outdated() {
        let guard = RaceGuard::new();
        let stale = guard.safeguard(async { Err::<(), _>(SearchError::transport("reset")) });
        let _newer = guard.issue();
        assert_eq!(stale.await, Err(SearchError::Outdated));
    }

    #[test]
    fn tickets_increase_and_only_the_latest_is_current() {
        let guard = RaceGuard::new();
        let a = guard.issue();
        let b = guard.issue();
        assert!(b > a);
        assert!(!guard.is_current(a));
        assert!(guard.is_current(b));

        let shared = guard.clone();
        let c = shared.issue();
        assert!(!guard.is_current(b));
        assert!(guard.is_current(c));
    }
}
