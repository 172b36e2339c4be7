use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error categories for programmatic handling of a watch outcome
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorKind {
    /// Thresholds that can never produce a verdict
    Configuration,
    /// Entry point called twice on one watcher
    Reuse,
    /// Watching could not start
    Setup,
    /// No steady state within the interval budget
    Timeout,
    /// The load callback failed; never fatal to the watch
    Callback,
    /// Aborted through the cancellation token
    Cancelled,
    /// The document could not be read mid-watch
    Document,
    /// The watch task died
    Aborted,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WatchError {
    #[error("steady threshold ({steady} intervals) must be below the interval budget ({max} intervals)")]
    Configuration { steady: u32, max: u32 },

    #[error("invalid watch configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("watcher already used; create a new instance for another watch")]
    Reuse,

    #[error("failed to start watching: {0}")]
    Setup(String),

    #[error("page did not settle within {intervals} intervals ({elapsed_ms}ms)")]
    Timeout { intervals: u32, elapsed_ms: u64 },

    #[error("load callback failed: {0}")]
    Callback(String),

    #[error("watch cancelled")]
    Cancelled,

    #[error("document read failed: {0}")]
    Document(String),

    /// The document is being replaced (e.g. navigation). Counts as a change.
    #[error("document context lost: {0}")]
    ContextLost(String),

    #[error("watch task aborted: {0}")]
    Aborted(String),
}

impl WatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } | Self::InvalidConfig(_) => ErrorKind::Configuration,
            Self::Reuse => ErrorKind::Reuse,
            Self::Setup(_) => ErrorKind::Setup,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Callback(_) => ErrorKind::Callback,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Document(_) | Self::ContextLost(_) => ErrorKind::Document,
            Self::Aborted(_) => ErrorKind::Aborted,
        }
    }

    /// Whether a fresh watcher on the same document may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Timeout | ErrorKind::Document)
    }

    pub fn document(message: impl Into<String>) -> Self {
        Self::Document(message.into())
    }

    pub fn context_lost(message: impl Into<String>) -> Self {
        Self::ContextLost(message.into())
    }
}

pub type Result<T> = std::result::Result<T, WatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_group_related_variants() {
        assert_eq!(WatchError::InvalidConfig("x").kind(), ErrorKind::Configuration);
        assert_eq!(WatchError::Configuration { steady: 5, max: 5 }.kind(), ErrorKind::Configuration);
        assert_eq!(WatchError::context_lost("nav").kind(), ErrorKind::Document);
    }

    #[test]
    fn only_timeouts_and_document_failures_are_retryable() {
        assert!(WatchError::Timeout { intervals: 21, elapsed_ms: 10_500 }.is_retryable());
        assert!(WatchError::document("gone").is_retryable());
        assert!(!WatchError::Reuse.is_retryable());
        assert!(!WatchError::Cancelled.is_retryable());
        assert!(!WatchError::Callback("boom".into()).is_retryable());
    }

    #[test]
    fn timeout_message_names_the_budget() {
        let err = WatchError::Timeout { intervals: 21, elapsed_ms: 10_500 };
        assert_eq!(err.to_string(), "page did not settle within 21 intervals (10500ms)");
    }
}
