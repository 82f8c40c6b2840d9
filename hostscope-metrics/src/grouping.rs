use std::collections::HashMap;

use crate::normalize::NormalizedResult;

/// Keys results by host identity, keeping the last result seen per host.
///
/// Results without an identity are left out. The view is lossy: callers that
/// need every series of a host (per-core CPU, per-disk usage) should iterate
/// the flat list instead.
pub fn group_by_identity(results: &[NormalizedResult]) -> HashMap<String, NormalizedResult> {
    let mut grouped = HashMap::with_capacity(results.len());
    for result in results.iter().filter(|r| r.has_identity()) {
        grouped.insert(result.identity.clone(), result.clone());
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(identity: &str, value: f64) -> NormalizedResult {
        NormalizedResult {
            identity: identity.to_string(),
            value,
            labels: HashMap::from([("ident".to_string(), identity.to_string())]),
        }
    }

    #[test]
    fn last_occurrence_wins() {
        let flat = vec![result("host1", 75.5), result("host1", 50.0)];
        let grouped = group_by_identity(&flat);

        assert_eq!(flat.len(), 2);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped["host1"].value, 50.0);
    }

    #[test]
    fn empty_identities_are_excluded() {
        let flat = vec![result("", 1.0), result("db-1", 2.0), result("", 3.0)];
        let grouped = group_by_identity(&flat);

        assert_eq!(grouped.len(), 1);
        assert!(!grouped.contains_key(""));
        assert_eq!(grouped["db-1"].value, 2.0);
    }

    #[test]
    fn interleaved_hosts_keep_their_own_last_value() {
        let flat = vec![
            result("a", 1.0),
            result("b", 10.0),
            result("a", 2.0),
            result("b", 20.0),
            result("a", 3.0),
        ];
        let grouped = group_by_identity(&flat);
        assert_eq!(grouped["a"].value, 3.0);
        assert_eq!(grouped["b"].value, 20.0);
        assert!(group_by_identity(&[]).is_empty());
    }
}
