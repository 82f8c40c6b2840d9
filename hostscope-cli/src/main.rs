mod config;
mod query;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use query::{Query, Rewrite};

#[derive(Debug, Parser)]
#[command(name = "hostscope")]
#[command(about = "Host-scoped instant queries against Prometheus-compatible APIs", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(long, short = 'c', global = true, help = "Path to the YAML configuration file")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run an instant query scoped to a set of hosts")]
    Query(Query),

    #[command(about = "Print a query with the host filter injected, without running it")]
    Rewrite(Rewrite),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Query(args) => query::handle_query(args, cli.config.as_deref()).await,
        Commands::Rewrite(args) => query::handle_rewrite(args),
    }
}
