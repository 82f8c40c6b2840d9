//! Instant query response envelope
//!
//! The wire JSON is decoded once into [`QueryResponse`], a tagged
//! success/failure value, so the rest of the pipeline never has to look at
//! the raw `status` string again.

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::DecodeMode;
use crate::errors::{MetricsError, Result};

const STATUS_SUCCESS: &str = "success";

/// Shape of the `data.result` payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResultType {
    Vector,
    Matrix,
    Scalar,
    String,
    Unknown(std::string::String),
}

impl ResultType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "vector" => ResultType::Vector,
            "matrix" => ResultType::Matrix,
            "scalar" => ResultType::Scalar,
            "string" => ResultType::String,
            other => ResultType::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ResultType::Vector => "vector",
            ResultType::Matrix => "matrix",
            ResultType::Scalar => "scalar",
            ResultType::String => "string",
            ResultType::Unknown(raw) => raw.as_str(),
        }
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Second element of a sample's value pair as it appeared on the wire.
#[derive(Clone, Debug, PartialEq)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

/// One series of an instant vector.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub labels: HashMap<String, String>,
    pub timestamp: f64,
    /// `None` when the value element was missing or null
    pub raw_value: Option<RawValue>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum QueryResponse {
    Success {
        result_type: ResultType,
        /// Populated only for vector results
        samples: Vec<Sample>,
        warnings: Vec<String>,
    },
    Failure {
        error_type: String,
        error_message: String,
        warnings: Vec<String>,
    },
}

impl QueryResponse {
    /// The zero value produced by lenient decoding of an unreadable body.
    pub fn empty_failure() -> Self {
        QueryResponse::Failure {
            error_type: String::new(),
            error_message: String::new(),
            warnings: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, QueryResponse::Success { .. })
    }

    pub fn result_type(&self) -> Option<&ResultType> {
        match self {
            QueryResponse::Success { result_type, .. } => Some(result_type),
            QueryResponse::Failure { .. } => None,
        }
    }

    pub fn samples(&self) -> &[Sample] {
        match self {
            QueryResponse::Success { samples, .. } => samples,
            QueryResponse::Failure { .. } => &[],
        }
    }

    pub fn warnings(&self) -> &[String] {
        match self {
            QueryResponse::Success { warnings, .. } | QueryResponse::Failure { warnings, .. } => {
                warnings
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct WireEnvelope {
    #[serde(default)]
    status: String,
    #[serde(default)]
    data: Option<WireData>,
    #[serde(default, rename = "errorType")]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    warnings: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct WireData {
    #[serde(default, rename = "resultType")]
    result_type: String,
    #[serde(default)]
    result: Value,
}

#[derive(Debug, Deserialize)]
struct WireSample {
    #[serde(default)]
    metric: Option<HashMap<String, String>>,
    #[serde(default)]
    value: Option<Vec<Value>>,
}

impl From<WireSample> for Sample {
    fn from(wire: WireSample) -> Self {
        let value = wire.value.unwrap_or_default();
        let timestamp = value.first().and_then(Value::as_f64).unwrap_or_default();
        let raw_value = match value.get(1) {
            Some(Value::String(text)) => Some(RawValue::Text(text.clone())),
            Some(Value::Number(n)) => n.as_f64().map(RawValue::Number),
            _ => None,
        };
        Sample {
            labels: wire.metric.unwrap_or_default(),
            timestamp,
            raw_value,
        }
    }
}

/// Decodes a response body into a [`QueryResponse`].
///
/// In lenient mode a body that is not a JSON envelope yields
/// [`QueryResponse::empty_failure`] instead of an error.
pub fn decode(body: &[u8], mode: DecodeMode) -> Result<QueryResponse> {
    let envelope: WireEnvelope = match serde_json::from_slice(body) {
        Ok(envelope) => envelope,
        Err(e) => match mode {
            DecodeMode::Strict => return Err(MetricsError::Decode(e)),
            DecodeMode::Lenient => {
                warn!(error = %e, "undecodable query response, treating it as empty");
                WireEnvelope::default()
            }
        },
    };

    let warnings = envelope.warnings.unwrap_or_default();

    if envelope.status != STATUS_SUCCESS {
        return Ok(QueryResponse::Failure {
            error_type: envelope.error_type.unwrap_or_default(),
            error_message: envelope.error.unwrap_or_default(),
            warnings,
        });
    }

    let (result_type, result) = match envelope.data {
        Some(data) => (ResultType::parse(&data.result_type), data.result),
        None => (ResultType::Unknown(String::new()), Value::Null),
    };

    let samples = if result_type == ResultType::Vector {
        match decode_samples(result, mode)? {
            Some(samples) => samples,
            None => return Ok(QueryResponse::empty_failure()),
        }
    } else {
        Vec::new()
    };

    Ok(QueryResponse::Success {
        result_type,
        samples,
        warnings,
    })
}

/// Decodes each element of a vector result on its own.
///
/// Lenient mode drops elements that do not decode and returns `None` when the
/// result is not an array at all; strict mode reports either as an error.
fn decode_samples(result: Value, mode: DecodeMode) -> Result<Option<Vec<Sample>>> {
    let items = match result {
        Value::Null => return Ok(Some(Vec::new())),
        Value::Array(items) => items,
        other => {
            let err = match serde_json::from_value::<Vec<WireSample>>(other) {
                Err(e) => e,
                Ok(_) => return Ok(Some(Vec::new())),
            };
            return match mode {
                DecodeMode::Strict => Err(MetricsError::Decode(err)),
                DecodeMode::Lenient => {
                    warn!(
                        error = %err,
                        "vector result is not an array, treating response as empty"
                    );
                    Ok(None)
                }
            };
        }
    };

    let mut samples = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<WireSample>(item) {
            Ok(wire) => samples.push(Sample::from(wire)),
            Err(e) => match mode {
                DecodeMode::Strict => return Err(MetricsError::Decode(e)),
                DecodeMode::Lenient => debug!(error = %e, "dropping undecodable sample"),
            },
        }
    }
    Ok(Some(samples))
}

/// Accepts only successful instant vector responses.
///
/// Warnings of a successful response are logged and otherwise ignored.
pub fn validate(resp: &QueryResponse) -> Result<()> {
    match resp {
        QueryResponse::Failure {
            error_type,
            error_message,
            ..
        } => Err(MetricsError::Api {
            error_type: error_type.clone(),
            message: error_message.clone(),
        }),
        QueryResponse::Success {
            result_type,
            warnings,
            samples,
        } => {
            if *result_type != ResultType::Vector {
                return Err(MetricsError::ResultType(result_type.clone()));
            }
            for warning in warnings {
                warn!(warning = %warning, "query API returned a warning");
            }
            debug!(samples = samples.len(), "validated instant vector response");
            Ok(())
        }
    }
}
