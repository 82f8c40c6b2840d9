use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use clap::{Args, Parser, ValueEnum};
use hostscope_metrics::{
    rewrite, CancellationToken, HostFilter, MetricsClient, MetricsConfig, NormalizedResult,
    QueryResponse, RawValue,
};
use tracing::info;

use crate::config::LoadConfiguration;

/// Host filter flags shared by `query` and `rewrite`.
#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    #[arg(long = "busigroup", help = "Business group to scope to (repeatable, any of them matches)")]
    pub business_groups: Vec<String>,

    #[arg(
        long = "tag",
        value_parser = parse_tag,
        help = "Exact label match as key=value (repeatable, all must match)"
    )]
    pub tags: Vec<(String, String)>,
}

impl FilterArgs {
    pub fn to_filter(&self) -> Option<HostFilter> {
        let filter = HostFilter {
            business_groups: self.business_groups.clone(),
            tags: self.tags.iter().cloned().collect(),
        };
        (!filter.is_empty()).then_some(filter)
    }
}

fn parse_tag(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("invalid tag '{}', expected key=value", raw)),
    }
}

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Parser)]
#[command(after_help = QUERY_EXAMPLES)]
pub struct Query {
    #[arg(help = "Instant PromQL query")]
    pub query: String,

    #[command(flatten)]
    pub filter: FilterArgs,

    #[arg(long, conflicts_with = "raw", help = "Keep only the last sample per host")]
    pub group: bool,

    #[arg(long, help = "Print the decoded response as returned, with warnings")]
    pub raw: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table, help = "Output format")]
    pub output: OutputFormat,

    #[arg(long, help = "Query API endpoint, overrides the config file")]
    pub endpoint: Option<String>,

    #[arg(long, help = "Per-request timeout in milliseconds, overrides the config file")]
    pub timeout_ms: Option<u64>,
}

const QUERY_EXAMPLES: &str = r#"
EXAMPLES:
    # CPU usage of every host in two business groups
    hostscope query 'cpu_usage_active{cpu="cpu-total"}' --busigroup prod --busigroup staging

    # Memory usage for production hosts in one region, one line per host
    hostscope --config hostscope.yml query mem_used_percent --tag env=prod --tag region=eu --group

    # Inspect warnings and result type
    hostscope query 'up' --raw --endpoint http://127.0.0.1:9090
"#;

#[derive(Debug, Parser)]
pub struct Rewrite {
    #[arg(help = "PromQL query to scope")]
    pub query: String,

    #[command(flatten)]
    pub filter: FilterArgs,
}

pub fn handle_rewrite(args: Rewrite) -> Result<()> {
    let filter = args.filter.to_filter();
    println!("{}", rewrite(&args.query, filter.as_ref()));
    Ok(())
}

pub async fn handle_query(args: Query, config_file: Option<&Path>) -> Result<()> {
    let mut load = match config_file {
        Some(path) => LoadConfiguration::from_file(path)?,
        None => LoadConfiguration::default(),
    };
    // command line flags override the config file
    if let Some(endpoint) = args.endpoint.clone() {
        load.prometheus.endpoint = Some(endpoint);
    }
    if let Some(timeout_ms) = args.timeout_ms {
        load.prometheus.timeout_ms = Some(timeout_ms);
    }

    let cfg = MetricsConfig::try_from(load)?;
    info!(endpoint = %cfg.endpoint, "querying metrics");
    let client = MetricsClient::new(cfg).context("Failed to create metrics client")?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let filter = args.filter.to_filter();
    let filter = filter.as_ref();

    if args.raw {
        let resp = client.query_raw(&args.query, filter, &cancel).await?;
        print_raw(&resp, args.output)?;
    } else if args.group {
        let grouped = client.query_grouped(&args.query, filter, &cancel).await?;
        print_grouped(&grouped, args.output)?;
    } else {
        let results = client.query(&args.query, filter, &cancel).await?;
        print_results(&results, args.output)?;
    }
    Ok(())
}

fn format_labels(labels: &HashMap<String, String>) -> String {
    let mut pairs: Vec<_> = labels.iter().collect();
    pairs.sort();
    let body = pairs
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, v))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{}}}", body)
}

fn identity_or_dash(identity: &str) -> &str {
    if identity.is_empty() {
        "-"
    } else {
        identity
    }
}

fn print_results(results: &[NormalizedResult], output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(results)?),
        OutputFormat::Table => {
            if results.is_empty() {
                println!("(no data)");
            }
            for r in results {
                println!(
                    "{:<32} {:>14} {}",
                    identity_or_dash(&r.identity),
                    r.value,
                    format_labels(&r.labels)
                );
            }
        }
    }
    Ok(())
}

fn print_grouped(grouped: &HashMap<String, NormalizedResult>, output: OutputFormat) -> Result<()> {
    let mut hosts: Vec<_> = grouped.keys().collect();
    hosts.sort();
    match output {
        OutputFormat::Json => {
            let mut values = serde_json::Map::new();
            for host in hosts {
                values.insert(host.clone(), serde_json::to_value(&grouped[host])?);
            }
            println!("{}", serde_json::to_string_pretty(&values)?);
        }
        OutputFormat::Table => {
            if hosts.is_empty() {
                println!("(no data)");
            }
            for host in hosts {
                println!("{:<32} {:>14}", host, grouped[host].value);
            }
        }
    }
    Ok(())
}

fn print_raw(resp: &QueryResponse, output: OutputFormat) -> Result<()> {
    match resp {
        QueryResponse::Failure {
            error_type,
            error_message,
            warnings,
        } => {
            if output == OutputFormat::Json {
                let value = serde_json::json!({
                    "status": "error",
                    "errorType": error_type,
                    "error": error_message,
                    "warnings": warnings,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("Status: error");
                println!("Error type: {}", error_type);
                println!("Error: {}", error_message);
                print_warnings(warnings);
            }
        }
        QueryResponse::Success {
            result_type,
            samples,
            warnings,
        } => {
            if output == OutputFormat::Json {
                let samples: Vec<_> = samples
                    .iter()
                    .map(|s| {
                        let value = match &s.raw_value {
                            Some(RawValue::Text(text)) => serde_json::json!(text),
                            Some(RawValue::Number(n)) => serde_json::json!(n),
                            None => serde_json::Value::Null,
                        };
                        serde_json::json!({ "metric": s.labels, "value": [s.timestamp, value] })
                    })
                    .collect();
                let value = serde_json::json!({
                    "status": "success",
                    "resultType": result_type.as_str(),
                    "result": samples,
                    "warnings": warnings,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("Status: success");
                println!("Result type: {}", result_type);
                println!("Samples: {}", samples.len());
                for s in samples {
                    let value = match &s.raw_value {
                        Some(RawValue::Text(text)) => text.clone(),
                        Some(RawValue::Number(n)) => n.to_string(),
                        None => "(none)".to_string(),
                    };
                    println!("  {} => {}", format_labels(&s.labels), value);
                }
                print_warnings(warnings);
            }
        }
    }
    Ok(())
}

fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        println!("Warning: {}", warning);
    }
}
