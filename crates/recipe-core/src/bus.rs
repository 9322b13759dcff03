//! In-process message bus between search surfaces and their controller.
//!
//! Publishing is fire-and-forget: a message with no live subscriber is
//! dropped, and a subscriber that falls behind skips ahead with a warning.

use crate::search::SearchFilters;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use ts_rs::TS;

pub const EXECUTE_SEARCH_EVENT: &str = "execute-search";
pub const SEARCH_SETTLED_EVENT: &str = "search-settled";

pub const BUS_EVENT_NAMES: &[&str] = &[EXECUTE_SEARCH_EVENT, SEARCH_SETTLED_EVENT];

pub const PHASE_FINISHED: &str = "finished";
pub const PHASE_CACHED: &str = "cached";
pub const PHASE_FAILED: &str = "failed";

const DEFAULT_BUS_CAPACITY: usize = 64;

/// Ask the controller to search now with these filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExecuteSearchEvent {
    pub filters: SearchFilters,
}

/// A search reached a user-visible end state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SearchSettledEvent {
    #[ts(type = "number")]
    pub request_id: u64,
    pub phase: String,
    #[ts(type = "number | null")]
    pub total: Option<u64>,
    pub code: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum BusMessage {
    ExecuteSearch(ExecuteSearchEvent),
    SearchSettled(SearchSettledEvent),
}

impl BusMessage {
    pub fn name(&self) -> &'static str {
        match self {
            BusMessage::ExecuteSearch(_) => EXECUTE_SEARCH_EVENT,
            BusMessage::SearchSettled(_) => SEARCH_SETTLED_EVENT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchBus {
    sender: broadcast::Sender<BusMessage>,
}

impl Default for SearchBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl SearchBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns how many subscribers saw the message.
    pub fn publish(&self, message: BusMessage) -> usize {
        let name = message.name();
        let delivered = self.sender.send(message).unwrap_or(0);
        debug!(event = name, delivered, "Published bus message");
        delivered
    }

    pub fn subscribe(&self) -> BusSubscription {
        BusSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[derive(Debug)]
pub struct BusSubscription {
    receiver: broadcast::Receiver<BusMessage>,
}

impl BusSubscription {
    /// Next message, or `None` once every bus handle is gone.
    pub async fn recv(&mut self) -> Option<BusMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Bus subscriber lagged; skipping ahead");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<BusMessage> {
        loop {
            match self.receiver.try_recv() {
                Ok(message) => return Some(message),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Bus subscriber lagged; skipping ahead");
                }
                Err(_) => return None,
            }
        }
    }
}
