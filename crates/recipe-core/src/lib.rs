pub mod bindings;
pub mod bus;
pub mod cancellation;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod race_guard;
pub mod search;

pub use bus::{BusMessage, SearchBus};
pub use cancellation::{CancelReason, CancellationSignal};
pub use error::SearchError;
pub use lifecycle::{LifecycleOptions, PendingRequest, RequestHandle, RequestLifecycleManager};
pub use race_guard::{RaceGuard, Ticket};
