//! Hostscope-Metrics
//!
//! Metrics acquisition for host inspection: scopes instant PromQL queries to a
//! set of hosts, runs them against a Prometheus-compatible API with bounded
//! retries, and turns the answer into values keyed by host identity.
//!
//! ```ignore
//! let client = MetricsClient::new(config)?;
//! let filter = HostFilter::new().with_business_group("prod").with_tag("region", "eu");
//! let by_host = client
//!     .query_grouped("cpu_usage_active{cpu=\"cpu-total\"}", Some(&filter), &cancel)
//!     .await?;
//! ```

mod client;
pub use client::MetricsClient;

mod config;
pub use config::{DecodeMode, MetricsConfig, RetryPolicy};

pub mod errors;
pub use errors::{MetricsError, Result, TransportError};

mod executor;
pub use executor::QueryExecutor;

mod grouping;
pub use grouping::group_by_identity;

mod normalize;
pub use normalize::{normalize, resolve_identity, NormalizedResult, IDENTITY_LABELS};

mod response;
pub use response::{decode, validate, QueryResponse, RawValue, ResultType, Sample};

mod rewriter;
pub use rewriter::{escape_regex, rewrite, HostFilter, BUSINESS_GROUP_LABEL};

mod transport;
pub use transport::{HttpTransport, QueryTransport, RawResponse};

pub use tokio_util::sync::CancellationToken;

#[cfg(test)]
mod client_test;
