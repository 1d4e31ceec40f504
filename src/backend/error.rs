//! Backend error types

use thiserror::Error;

/// Remote call failure with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Timeout, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Decode, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Rejected, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::ServerError, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::NotFound, message)
    }
}

/// Error classification, used to pick the notification wording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// Connection refused, DNS, TLS
    Network,
    /// Request exceeded the configured timeout
    Timeout,
    /// Body was not the JSON we expected
    Decode,
    /// 4xx other than 404; the service's message is user-facing
    Rejected,
    /// 5xx
    ServerError,
    /// 404
    NotFound,
}

impl BackendErrorKind {
    /// Whether the user can reasonably resubmit the same thing
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Network | Self::Timeout | Self::ServerError)
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(format!("Request timed out: {err}"))
        } else if err.is_decode() {
            Self::decode(format!("Unexpected response body: {err}"))
        } else {
            Self::network(format!("Request failed: {err}"))
        }
    }
}
