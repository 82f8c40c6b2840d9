use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::config::RetryPolicy;
use crate::errors::{MetricsError, Result, TransportError};
use crate::transport::{QueryTransport, RawResponse};

/// Runs queries over a transport with bounded exponential backoff.
///
/// Transport failures and 5xx responses are retried up to
/// `max_retries` times; any other non-2xx status is returned at once.
#[derive(Debug, Clone)]
pub struct QueryExecutor<T> {
    transport: T,
    retry: RetryPolicy,
}

impl<T: QueryTransport> QueryExecutor<T> {
    pub fn new(transport: T, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    /// Executes `query`, returning the first 2xx response or the last error.
    ///
    /// A cancelled token ends the call immediately, including during a
    /// backoff sleep, with [`TransportError::Cancelled`].
    pub async fn execute(&self, query: &str, cancel: &CancellationToken) -> Result<RawResponse> {
        let max_attempts = self.retry.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransportError::Cancelled.into()),
                res = self.transport.get(query) => res,
            };

            let err = match outcome {
                Ok(resp) if resp.is_success() => {
                    debug!(attempt, status = resp.status, "instant query succeeded");
                    return Ok(resp);
                }
                Ok(resp) => MetricsError::HttpStatus {
                    status: resp.status,
                    body: resp.body_text(),
                },
                Err(e) => MetricsError::Transport(e),
            };

            if !err.is_retryable() {
                warn!(attempt, error = %err, "non-retryable error in instant query");
                return Err(err);
            }

            if attempt >= max_attempts {
                error!(attempts = attempt, error = %err, "instant query retries exhausted");
                return Err(err);
            }

            let backoff = self.retry.backoff(attempt - 1);
            warn!(
                attempt,
                max_attempts,
                backoff_ms = backoff.as_millis() as u64,
                error = %err,
                "retrying instant query"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransportError::Cancelled.into()),
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }
}
