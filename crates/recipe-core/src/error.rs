//! Error taxonomy for the search layer.
//!
//! `Aborted` and `Outdated` are control-flow outcomes that callers absorb
//! silently. Everything else is meant for the user.

use crate::cancellation::CancelReason;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("request aborted ({reason})")]
    Aborted { reason: CancelReason },
    #[error("result superseded by a newer request")]
    Outdated,
    #[error("network request failed: {message}")]
    Transport { message: String },
    #[error("search service returned {status}: {message}")]
    Server { status: u16, message: String },
    #[error("failed to parse search response: {message}")]
    MalformedResponse { message: String },
    #[error("invalid search configuration: {message}")]
    Config { message: String },
}

impl SearchError {
    pub fn aborted(reason: CancelReason) -> Self {
        Self::Aborted { reason }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Stable machine-readable code, mirrored into `search-settled` events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Aborted { .. } => "operation_cancelled",
            Self::Outdated => "outdated_result",
            Self::Transport { .. } => "transport_failed",
            Self::Server { .. } => "server_error",
            Self::MalformedResponse { .. } => "parse_failed",
            Self::Config { .. } => "invalid_config",
        }
    }

    /// True for outcomes that must never reach the user.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::Aborted { .. } | Self::Outdated)
    }
}
