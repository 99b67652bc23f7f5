// Error Classification (closed taxonomy shared by pool, executor and callers)

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification tag attached to every failure
///
/// Determines retry eligibility:
/// - `TransientConnection` / `TransientResource`: retried with backoff
/// - `Timeout`: never retried (a slow statement stays slow)
/// - `Fatal`: never retried, surfaced immediately
/// - `PoolClosed` / `Cancelled`: terminal, produced by the pool or the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    TransientConnection,
    TransientResource,
    Timeout,
    Fatal,
    PoolClosed,
    Cancelled,
}

impl ErrorKind {
    /// Whether a failure of this kind may be retried by the executor
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::TransientConnection | ErrorKind::TransientResource
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::TransientConnection => "transientConnection",
            ErrorKind::TransientResource => "transientResource",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Fatal => "fatal",
            ErrorKind::PoolClosed => "poolClosed",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure returned to callers of the executor and the pool
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("{kind}: {message}")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    /// Number of retries performed before this error was returned
    pub retries_attempted: u32,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retries_attempted: 0,
        }
    }

    pub fn pool_closed() -> Self {
        Self::new(ErrorKind::PoolClosed, "connection pool is closed")
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "operation cancelled by caller")
    }

    pub fn with_retries(mut self, retries_attempted: u32) -> Self {
        self.retries_attempted = retries_attempted;
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_kinds_are_retryable() {
        assert!(ErrorKind::TransientConnection.is_retryable());
        assert!(ErrorKind::TransientResource.is_retryable());
        assert!(!ErrorKind::Timeout.is_retryable());
        assert!(!ErrorKind::Fatal.is_retryable());
        assert!(!ErrorKind::PoolClosed.is_retryable());
        assert!(!ErrorKind::Cancelled.is_retryable());
    }

    #[test]
    fn test_classified_error_wire_format() {
        let err = ClassifiedError::new(ErrorKind::TransientResource, "too many connections")
            .with_retries(2);

        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "transientResource");
        assert_eq!(json["retriesAttempted"], 2);
        assert_eq!(err.to_string(), "transientResource: too many connections");
    }
}
