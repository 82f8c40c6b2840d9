use async_trait::async_trait;
use tracing::debug;

use crate::config::MetricsConfig;
use crate::errors::{MetricsError, Result, TransportError};

/// Status code and body of one HTTP attempt, whatever the status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A single instant query round trip, without any retry.
#[async_trait]
pub trait QueryTransport: Send + Sync {
    async fn get(&self, query: &str) -> std::result::Result<RawResponse, TransportError>;
}

/// `GET <endpoint>/api/v1/query?query=...` over reqwest.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    http: reqwest::Client,
    query_url: String,
}

impl HttpTransport {
    pub fn new(cfg: &MetricsConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| {
                MetricsError::InvalidConfig(format!("unable to build HTTP client: {}", e))
            })?;
        Ok(Self {
            http,
            query_url: cfg.query_url(),
        })
    }
}

#[async_trait]
impl QueryTransport for HttpTransport {
    async fn get(&self, query: &str) -> std::result::Result<RawResponse, TransportError> {
        debug!(url = %self.query_url, query = %query, "sending instant query");
        let resp = self
            .http
            .get(&self.query_url)
            .query(&[("query", query)])
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(TransportError::from_reqwest)?;
        Ok(RawResponse::new(status, body.to_vec()))
    }
}
