#[cfg(test)]
use crate::{
    client::MetricsClient,
    config::{DecodeMode, MetricsConfig, RetryPolicy},
    errors::MetricsError,
    executor::test_support::{status, ScriptedTransport},
    response::ResultType,
    rewriter::HostFilter,
};
#[cfg(test)]
use std::time::Duration;
#[cfg(test)]
use tokio_util::sync::CancellationToken;

#[cfg(test)]
const HOST1_TWICE: &str = r#"{
    "status": "success",
    "data": {
        "resultType": "vector",
        "result": [
            {"metric": {"__name__": "cpu_usage_active", "ident": "host1", "cpu": "cpu0"}, "value": [1704067200, "75.5"]},
            {"metric": {"__name__": "cpu_usage_active", "ident": "host1", "cpu": "cpu1"}, "value": [1704067200, "50.0"]},
            {"metric": {"__name__": "cpu_usage_active", "cpu": "cpu0"}, "value": [1704067200, "10"]},
            {"metric": {"__name__": "cpu_usage_active", "host": "host2"}, "value": [1704067200, "NaN"]}
        ]
    }
}"#;

#[cfg(test)]
fn test_client(transport: ScriptedTransport, mode: DecodeMode) -> MetricsClient<ScriptedTransport> {
    let cfg = MetricsConfig::new(
        "http://prometheus.test:9090",
        Duration::from_secs(5),
        RetryPolicy::new(3, Duration::from_millis(10)),
    )
    .with_decode_mode(mode);
    MetricsClient::with_transport(cfg, transport)
}

/// Test: flat list keeps every sample, grouped view keeps the last per host
///
/// Flow
/// - Serve a vector with two host1 series, one unidentifiable series and a NaN
/// - Query through the flat and the grouped entry points
///
/// Expected
/// - Flat list: three entries in response order, the NaN dropped
/// - Grouped map: only host1, holding the second value
#[tokio::test(start_paused = true)]
async fn test_flat_and_grouped_views() {
    let transport = ScriptedTransport::new(vec![status(200, HOST1_TWICE), status(200, HOST1_TWICE)]);
    let client = test_client(transport.clone(), DecodeMode::Lenient);
    let cancel = CancellationToken::new();

    let flat = client.query("cpu_usage_active", None, &cancel).await.unwrap();
    assert_eq!(flat.len(), 3);
    assert_eq!(flat[0].value, 75.5);
    assert_eq!(flat[1].value, 50.0);
    assert_eq!(flat[2].identity, "");

    let grouped = client
        .query_grouped("cpu_usage_active", None, &cancel)
        .await
        .unwrap();
    assert_eq!(grouped.len(), 1);
    assert_eq!(grouped["host1"].value, 50.0);
    assert_eq!(grouped["host1"].label("cpu"), Some("cpu1"));
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_filter_reaches_transport() {
    let transport = ScriptedTransport::new(vec![status(
        200,
        r#"{"status":"success","data":{"resultType":"vector","result":[]}}"#,
    )]);
    let client = test_client(transport.clone(), DecodeMode::Lenient);
    let filter = HostFilter::new()
        .with_business_group("prod.web")
        .with_tag("region", "eu");

    let results = client
        .query("100 - cpu_usage_idle", Some(&filter), &CancellationToken::new())
        .await
        .unwrap();

    assert!(results.is_empty());
    assert_eq!(
        transport.queries(),
        vec!["100 - cpu_usage_idle{businigroup=~\"prod\\.web\", region=\"eu\"}".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_raw_access_exposes_warnings_and_result_type() {
    let transport = ScriptedTransport::new(vec![status(
        200,
        r#"{"status":"success","data":{"resultType":"matrix","result":[]},"warnings":["slow"]}"#,
    )]);
    let client = test_client(transport, DecodeMode::Lenient);

    let resp = client
        .query_raw("cpu_usage_active[5m]", None, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(resp.result_type(), Some(&ResultType::Matrix));
    assert_eq!(resp.warnings(), ["slow".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_matrix_result_fails_query() {
    let transport = ScriptedTransport::new(vec![status(
        200,
        r#"{"status":"success","data":{"resultType":"matrix","result":[]}}"#,
    )]);
    let client = test_client(transport.clone(), DecodeMode::Lenient);

    let err = client
        .query("cpu_usage_active[5m]", None, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, MetricsError::ResultType(ResultType::Matrix)));
    assert_eq!(transport.calls(), 1);
}

/// Test: API errors arrive with a 4xx status and are never retried
#[tokio::test(start_paused = true)]
async fn test_api_error_status_is_final() {
    let transport = ScriptedTransport::new(vec![status(
        422,
        r#"{"status":"error","errorType":"execution","error":"too many samples"}"#,
    )]);
    let client = test_client(transport.clone(), DecodeMode::Lenient);

    let err = client
        .query("up", None, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(422));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_api_error_in_success_status() {
    let transport = ScriptedTransport::new(vec![status(
        200,
        r#"{"status":"error","errorType":"timeout","error":"query timed out"}"#,
    )]);
    let client = test_client(transport.clone(), DecodeMode::Lenient);

    let err = client
        .query("up", None, &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        MetricsError::Api {
            error_type,
            message,
        } => {
            assert_eq!(error_type, "timeout");
            assert_eq!(message, "query timed out");
        }
        other => panic!("expected API error, got {:?}", other),
    }
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_decode_modes_on_garbage_body() {
    let lenient = test_client(
        ScriptedTransport::new(vec![status(200, "garbage")]),
        DecodeMode::Lenient,
    );
    let err = lenient
        .query("up", None, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, MetricsError::Api { .. }));

    let strict = test_client(
        ScriptedTransport::new(vec![status(200, "garbage")]),
        DecodeMode::Strict,
    );
    let err = strict
        .query("up", None, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, MetricsError::Decode(_)));
}
