use thiserror::Error;

use crate::response::ResultType;

pub type Result<T> = std::result::Result<T, MetricsError>;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("unexpected HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("query API error ({error_type}): {message}")]
    Api { error_type: String, message: String },

    #[error("unsupported result type {0}, only instant vector results are supported")]
    ResultType(ResultType),

    #[error("unable to decode the response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Failures of a single HTTP attempt, before any status code is known.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("query cancelled")]
    Cancelled,
}

impl TransportError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connection(err.to_string())
        } else {
            TransportError::Request(err)
        }
    }
}

impl MetricsError {
    /// Transport failures and 5xx answers are worth another attempt; client
    /// errors, API errors and cancellation are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            MetricsError::Transport(TransportError::Cancelled) => false,
            MetricsError::Transport(_) => true,
            MetricsError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, MetricsError::Transport(TransportError::Cancelled))
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            MetricsError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
