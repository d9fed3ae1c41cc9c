//! Failure taxonomy for outbound calls

use std::time::Duration;
use thiserror::Error;

/// JSON-RPC "method not found"
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Broad class of a failure, drives retry and logging policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Timeout or unreachable peer; retried with backoff
    Transport,
    /// The peer answered but rejected or garbled the call; never retried
    Protocol,
    /// Missing or invalid endpoint; the caller stays idle until corrected
    Configuration,
}

/// Error returned by an outbound HTTP or JSON-RPC call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection refused, DNS failure, TLS failure or the request was blocked
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("HTTP error {status}")]
    HttpError { status: u16 },

    #[error("RPC error {code}: {message}")]
    RpcError { code: i64, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl CallError {
    pub fn class(&self) -> ErrorClass {
        match self {
            CallError::InvalidEndpoint { .. } => ErrorClass::Configuration,
            CallError::Timeout(_) | CallError::NetworkUnreachable(_) => ErrorClass::Transport,
            // Gateways in front of nodes answer 5xx/429 while the node restarts
            CallError::HttpError { status } if *status >= 500 || *status == 429 => {
                ErrorClass::Transport
            }
            CallError::HttpError { .. } | CallError::RpcError { .. } | CallError::Malformed(_) => {
                ErrorClass::Protocol
            }
        }
    }

    /// Only transport failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transport
    }

    pub fn is_method_not_found(&self) -> bool {
        matches!(self, CallError::RpcError { code, .. } if *code == METHOD_NOT_FOUND)
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            CallError::Timeout(timeout)
        } else if err.is_decode() {
            CallError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            CallError::HttpError {
                status: status.as_u16(),
            }
        } else {
            CallError::NetworkUnreachable(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(CallError::Timeout(Duration::from_secs(10)).is_retryable());
        assert!(CallError::NetworkUnreachable("refused".into()).is_retryable());
        assert!(CallError::HttpError { status: 503 }.is_retryable());
        assert!(!CallError::HttpError { status: 404 }.is_retryable());
        assert!(!CallError::RpcError {
            code: -32000,
            message: "header not found".into()
        }
        .is_retryable());
        assert_eq!(
            CallError::InvalidEndpoint {
                endpoint: "x".into(),
                reason: "relative URL without a base".into()
            }
            .class(),
            ErrorClass::Configuration
        );
    }

    #[test]
    fn test_method_not_found() {
        let err = CallError::RpcError {
            code: METHOD_NOT_FOUND,
            message: "the method eth_hashrate does not exist".into(),
        };
        assert!(err.is_method_not_found());
    }
}
