use std::fs::read_to_string;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use hostscope_metrics::{DecodeMode, MetricsConfig, RetryPolicy};
use serde::{Deserialize, Serialize};

pub(crate) const ENDPOINT_ENV: &str = "HOSTSCOPE_ENDPOINT";

const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BASE_BACKOFF_MS: u64 = 1_000;

/// configuration settings loaded from the config file
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct LoadConfiguration {
    /// Query API settings
    #[serde(default)]
    pub(crate) prometheus: PrometheusConfig,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PrometheusConfig {
    /// Base URL of the Prometheus-compatible API
    pub(crate) endpoint: Option<String>,
    /// Per-request timeout in milliseconds
    pub(crate) timeout_ms: Option<u64>,
    /// Retry policy for transient failures
    #[serde(default)]
    pub(crate) retry: RetryConfig,
    /// `lenient` (default) or `strict` handling of unreadable bodies
    pub(crate) decode_mode: Option<DecodeMode>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RetryConfig {
    pub(crate) max_retries: Option<u32>,
    pub(crate) base_backoff_ms: Option<u64>,
}

impl LoadConfiguration {
    pub(crate) fn from_file(path: &Path) -> Result<Self> {
        let content = read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub(crate) fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}

/// Implementing the TryFrom trait to transform LoadConfiguration into MetricsConfig,
/// filling in defaults for everything left out of the file
impl TryFrom<LoadConfiguration> for MetricsConfig {
    type Error = anyhow::Error;

    fn try_from(config: LoadConfiguration) -> Result<Self> {
        let prom = config.prometheus;

        let endpoint = match prom.endpoint {
            Some(endpoint) => endpoint,
            None => std::env::var(ENDPOINT_ENV).with_context(|| {
                format!(
                    "No endpoint configured: set prometheus.endpoint, --endpoint or {}",
                    ENDPOINT_ENV
                )
            })?,
        };

        let retry = RetryPolicy::new(
            prom.retry.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            Duration::from_millis(prom.retry.base_backoff_ms.unwrap_or(DEFAULT_BASE_BACKOFF_MS)),
        );

        let cfg = MetricsConfig::new(
            endpoint,
            Duration::from_millis(prom.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)),
            retry,
        )
        .with_decode_mode(prom.decode_mode.unwrap_or_default());

        cfg.validate().context("Invalid prometheus configuration")?;
        Ok(cfg)
    }
}
