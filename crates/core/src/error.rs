use serde::{Deserialize, Serialize};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Adapter errors
// ---------------------------------------------------------------------------

/// Every way a broker call can fail once it has been dispatched to an
/// adapter. Adapters catch their own failures and return this; nothing
/// below the API layer panics or rethrows a library error raw.
///
/// The kind discriminant survives through every layer and is only
/// flattened to a message string at the HTTP boundary.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The automation terminal exited non-zero or wrote to stderr.
    #[error("automation terminal failed: {0}")]
    Subprocess(String),

    /// The terminal produced output that violates the one-line structured
    /// reply contract, or a reply body did not match the expected shape.
    #[error("malformed broker reply: {0}")]
    Parse(String),

    /// Transport-level failure talking to the exchange.
    #[error("network failure: {0}")]
    Network(String),

    /// The broker understood the request and refused it. Rate-limit
    /// rejections land here too, with the limit detail preserved.
    #[error("broker rejected the request: {0}")]
    Rejected(String),

    /// The broker call exceeded its time bound and was cut off.
    #[error("broker call exceeded {}s and was terminated", .0.as_secs())]
    Timeout(Duration),
}

/// Wire-friendly discriminant for [`AdapterError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterErrorKind {
    SubprocessFailure,
    ParseFailure,
    NetworkFailure,
    BrokerRejected,
    Timeout,
}

impl AdapterError {
    pub fn kind(&self) -> AdapterErrorKind {
        match self {
            AdapterError::Subprocess(_) => AdapterErrorKind::SubprocessFailure,
            AdapterError::Parse(_) => AdapterErrorKind::ParseFailure,
            AdapterError::Network(_) => AdapterErrorKind::NetworkFailure,
            AdapterError::Rejected(_) => AdapterErrorKind::BrokerRejected,
            AdapterError::Timeout(_) => AdapterErrorKind::Timeout,
        }
    }

    /// Whether a caller can reasonably retry the same request. Timeouts
    /// and transient network failures are retryable; rejections and
    /// protocol violations are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            AdapterErrorKind::Timeout | AdapterErrorKind::NetworkFailure
        )
    }
}

// ---------------------------------------------------------------------------
// Request validation
// ---------------------------------------------------------------------------

/// A malformed request body, caught before any adapter is invoked.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            AdapterError::Subprocess("exit 1".into()).kind(),
            AdapterErrorKind::SubprocessFailure
        );
        assert_eq!(
            AdapterError::Timeout(Duration::from_secs(30)).kind(),
            AdapterErrorKind::Timeout
        );
    }

    #[test]
    fn test_retryability() {
        assert!(AdapterError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(AdapterError::Network("connection reset".into()).is_retryable());
        assert!(!AdapterError::Rejected("insufficient funds".into()).is_retryable());
        assert!(!AdapterError::Parse("two lines".into()).is_retryable());
    }

    #[test]
    fn test_kind_wire_names() {
        let json = serde_json::to_string(&AdapterErrorKind::SubprocessFailure).unwrap();
        assert_eq!(json, "\"subprocess_failure\"");
        let json = serde_json::to_string(&AdapterErrorKind::BrokerRejected).unwrap();
        assert_eq!(json, "\"broker_rejected\"");
    }
}
