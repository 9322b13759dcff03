use crate::error::SearchError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;

/// Why a signal fired. The first cancellation wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    Explicit,
    Superseded,
    Timeout,
    Shutdown,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CancelReason::Explicit => "explicit",
            CancelReason::Superseded => "superseded",
            CancelReason::Timeout => "timeout",
            CancelReason::Shutdown => "shutdown",
        };
        write!(f, "{label}")
    }
}

#[derive(Clone, Debug, Default)]
pub struct CancellationSignal {
    token: CancellationToken,
    reason: Arc<OnceLock<CancelReason>>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancel_with(CancelReason::Explicit);
    }

    pub fn cancel_with(&self, reason: CancelReason) {
        let _ = self.reason.set(reason);
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn reason(&self) -> Option<CancelReason> {
        if self.is_cancelled() {
            self.reason.get().copied()
        } else {
            None
        }
    }

    /// Resolves once the signal fires, returning the reason.
    pub async fn cancelled(&self) -> CancelReason {
        self.token.cancelled().await;
        self.reason.get().copied().unwrap_or(CancelReason::Explicit)
    }

    pub fn check_cancelled(&self, stage: &'static str) -> Result<(), SearchError> {
        if let Some(reason) = self.reason() {
            tracing::trace!(stage, %reason, "operation cancelled");
            return Err(SearchError::aborted(reason));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_reason_wins() {
        let signal = CancellationSignal::new();
        assert_eq!(signal.reason(), None);
        assert!(signal.check_cancelled("before").is_ok());

        signal.cancel_with(CancelReason::Timeout);
        signal.cancel_with(CancelReason::Superseded);

        assert!(signal.is_cancelled());
        assert_eq!(signal.reason(), Some(CancelReason::Timeout));
        assert_eq!(
            signal.check_cancelled("after"),
            Err(SearchError::aborted(CancelReason::Timeout))
        );
    }

    #[tokio::test]
    async fn clones_observe_the_same_cancellation() {
        let signal = CancellationSignal::new();
        let observer = signal.clone();
        let waiter = tokio::spawn(async move { observer.cancelled().await });

        signal.cancel();

        let reason = waiter.await.expect("waiter should join");
        assert_eq!(reason, CancelReason::Explicit);
    }
}
