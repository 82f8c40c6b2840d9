use std::collections::HashMap;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::{DecodeMode, MetricsConfig};
use crate::errors::Result;
use crate::executor::QueryExecutor;
use crate::grouping::group_by_identity;
use crate::normalize::{normalize, NormalizedResult};
use crate::response::{decode, validate, QueryResponse};
use crate::rewriter::{rewrite, HostFilter};
use crate::transport::{HttpTransport, QueryTransport};

/// Host-scoped instant queries against a Prometheus-compatible API.
///
/// Each call rewrites the query for the given [`HostFilter`], executes it
/// with the configured retry policy and decodes the response. The client
/// keeps no per-query state and can be shared between concurrent callers.
#[derive(Debug, Clone)]
pub struct MetricsClient<T = HttpTransport> {
    executor: QueryExecutor<T>,
    decode_mode: DecodeMode,
}

impl MetricsClient<HttpTransport> {
    pub fn new(cfg: MetricsConfig) -> Result<Self> {
        cfg.validate()?;
        let transport = HttpTransport::new(&cfg)?;
        Ok(Self::with_transport(cfg, transport))
    }
}

impl<T: QueryTransport> MetricsClient<T> {
    pub fn with_transport(cfg: MetricsConfig, transport: T) -> Self {
        Self {
            executor: QueryExecutor::new(transport, cfg.retry),
            decode_mode: cfg.decode_mode,
        }
    }

    /// Runs the query and returns the decoded response without validating it,
    /// for callers that need warnings or the result type.
    pub async fn query_raw(
        &self,
        query: &str,
        filter: Option<&HostFilter>,
        cancel: &CancellationToken,
    ) -> Result<QueryResponse> {
        let rewritten = rewrite(query, filter);
        debug!(query = %query, rewritten = %rewritten, "executing instant query");
        let raw = self.executor.execute(&rewritten, cancel).await?;
        decode(&raw.body, self.decode_mode)
    }

    /// Runs the query and returns one result per usable sample, in response
    /// order.
    pub async fn query(
        &self,
        query: &str,
        filter: Option<&HostFilter>,
        cancel: &CancellationToken,
    ) -> Result<Vec<NormalizedResult>> {
        let resp = self.query_raw(query, filter, cancel).await?;
        validate(&resp)?;
        Ok(normalize(&resp))
    }

    /// Runs the query and keys the results by host identity, last sample
    /// per host winning.
    pub async fn query_grouped(
        &self,
        query: &str,
        filter: Option<&HostFilter>,
        cancel: &CancellationToken,
    ) -> Result<HashMap<String, NormalizedResult>> {
        let results = self.query(query, filter, cancel).await?;
        Ok(group_by_identity(&results))
    }
}
