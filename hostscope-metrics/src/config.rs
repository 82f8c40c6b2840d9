use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{MetricsError, Result};

/// Upper bound of a single backoff step, as a multiple of the base delay.
const MAX_BACKOFF_FACTOR: u32 = 8;

/// Bounded exponential backoff applied between query attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Total number of attempts allowed, the first one included.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry_index` (0 for the first retry):
    /// `base * 2^retry_index`, capped at `8 * base`.
    pub fn backoff(&self, retry_index: u32) -> Duration {
        let factor = 1u32
            .checked_shl(retry_index)
            .unwrap_or(u32::MAX)
            .min(MAX_BACKOFF_FACTOR);
        self.base_delay.saturating_mul(factor)
    }
}

/// How to treat a response body that is not valid JSON.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeMode {
    /// Undecodable bodies become an empty failure response.
    #[default]
    Lenient,
    /// Undecodable bodies are reported as decode errors.
    Strict,
}

/// Connection settings for the time-series query API.
///
/// Values are taken as given; defaults belong to whoever loads the
/// configuration.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Base URL of the API, e.g. `http://prometheus:9090`
    pub endpoint: String,
    /// Timeout applied to each HTTP attempt
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub decode_mode: DecodeMode,
}

impl MetricsConfig {
    pub fn new(endpoint: impl Into<String>, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
            retry,
            decode_mode: DecodeMode::Lenient,
        }
    }

    pub fn with_decode_mode(mut self, decode_mode: DecodeMode) -> Self {
        self.decode_mode = decode_mode;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(MetricsError::InvalidConfig("endpoint is empty".into()));
        }
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(MetricsError::InvalidConfig(format!(
                "endpoint {} must start with http:// or https://",
                endpoint
            )));
        }
        if self.timeout.is_zero() {
            return Err(MetricsError::InvalidConfig("timeout must be positive".into()));
        }
        Ok(())
    }

    /// Full URL of the instant query endpoint.
    pub fn query_url(&self) -> String {
        format!("{}/api/v1/query", self.endpoint.trim().trim_end_matches('/'))
    }
}
