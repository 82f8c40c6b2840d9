use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::response::{QueryResponse, RawValue, Sample};

/// Label keys tried, in order, to tie a sample back to a monitored host.
pub const IDENTITY_LABELS: [&str; 3] = ["ident", "host", "instance"];

const SENTINELS: [&str; 3] = ["NaN", "+Inf", "-Inf"];

/// A sample reduced to the host it belongs to and a finite value.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NormalizedResult {
    /// Empty when none of the identity labels is set
    pub identity: String,
    pub value: f64,
    pub labels: HashMap<String, String>,
}

impl NormalizedResult {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn has_identity(&self) -> bool {
        !self.identity.is_empty()
    }
}

/// Resolves the host identity of a label set: the first non-empty value of
/// `ident`, `host`, `instance`, or the empty string.
pub fn resolve_identity(labels: &HashMap<String, String>) -> String {
    IDENTITY_LABELS
        .iter()
        .filter_map(|key| labels.get(*key))
        .find(|value| !value.is_empty())
        .cloned()
        .unwrap_or_default()
}

/// Flattens the samples of a validated response, in response order.
///
/// Samples without a value, with a NaN/Inf value or with an unparseable value
/// are skipped.
pub fn normalize(resp: &QueryResponse) -> Vec<NormalizedResult> {
    resp.samples().iter().filter_map(normalize_sample).collect()
}

fn normalize_sample(sample: &Sample) -> Option<NormalizedResult> {
    let value = match &sample.raw_value {
        None => {
            debug!(labels = ?sample.labels, "dropping sample without value");
            return None;
        }
        Some(RawValue::Text(text)) if SENTINELS.contains(&text.as_str()) => {
            debug!(labels = ?sample.labels, value = %text, "dropping non-finite sample");
            return None;
        }
        Some(RawValue::Text(text)) => match text.trim().parse::<f64>() {
            Ok(v) => v,
            Err(e) => {
                debug!(labels = ?sample.labels, value = %text, error = %e, "dropping unparseable sample");
                return None;
            }
        },
        Some(RawValue::Number(v)) => *v,
    };

    if !value.is_finite() {
        debug!(labels = ?sample.labels, value, "dropping non-finite sample");
        return None;
    }

    Some(NormalizedResult {
        identity: resolve_identity(&sample.labels),
        value,
        labels: sample.labels.clone(),
    })
}
