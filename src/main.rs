//! Lookout CLI
//!
//! Submit a query to a remote log service, watch it to completion, and
//! write the results in the requested encoding.

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lookout::{
    config::generate_default_config, render, Config, EngineConfig, HttpQueryService,
    HttpServiceConfig, LoggingConfig, OutputEncoding, Progress, QueryEngine, QueryError,
    QueryHandle, QueryResult, QueryStatus, ResourceSelection, TimeRange,
};

/// Submission retries on throttling, with exponential backoff
const SUBMIT_ATTEMPTS: u32 = 3;

#[derive(Parser)]
#[command(name = "lookout")]
#[command(version)]
#[command(about = "Run asynchronous queries against a remote log service")]
#[command(after_help = r#"TIME EXPRESSIONS:
    ISO 8601:      2025-06-01T10:00:00Z, 2025-06-01
    Epoch millis:  1717243200000
    Relative:      30s, 5m, 2h, 1d, now
    Named ranges:  last-hour, last-24h, last-week, today, yesterday

EXAMPLES:
    lookout --profile prod --resources '/app/api-*' --start-time 1h \
        --query 'fields @timestamp, @message | filter level = "error"'

    lookout --profile prod --resources /app/api-prod --start-time yesterday \
        --query-file slow_requests.txt --format csv
"#)]
struct Cli {
    /// Query text to execute
    #[arg(long, conflicts_with = "query_file")]
    #[arg(required_unless_present_any = ["query_file", "init_config"])]
    query: Option<String>,

    /// Read the query text from this file
    #[arg(long)]
    query_file: Option<PathBuf>,

    /// Comma-separated resource names; a trailing * expands by prefix
    #[arg(long, required_unless_present = "init_config")]
    resources: Option<String>,

    /// Start of the time range
    #[arg(long, required_unless_present = "init_config")]
    start_time: Option<String>,

    /// End of the time range
    #[arg(long, default_value = "now")]
    end_time: String,

    /// Credential profile from the config file
    #[arg(long, required_unless_present = "init_config")]
    profile: Option<String>,

    /// Output format: table, csv, or json
    #[arg(long, default_value = "table")]
    format: String,

    /// Write results here instead of the default location
    #[arg(long)]
    output_file: Option<PathBuf>,

    /// Maximum rows to retrieve
    #[arg(long)]
    limit: Option<usize>,

    /// Seconds between status polls
    #[arg(long)]
    update_interval: Option<u64>,

    /// Drop @-prefixed metadata columns from the output
    #[arg(long)]
    exclude_metadata: bool,

    /// Config file path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print a starter config file and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.init_config {
        print!("{}", generate_default_config());
        return;
    }

    let config = match &cli.config {
        Some(path) => match Config::load_with_env(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("✗ Error: {}", e);
                std::process::exit(1);
            }
        },
        None => Config::load_default(),
    };

    init_tracing(&config.logging);

    // A query left running on the service keeps running after an
    // interrupt; nothing is cancelled implicitly.
    let exit_code = tokio::select! {
        result = run(&cli, &config) => match result {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("{}", render_error(&e));
                1
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\n✗ Query interrupted by user");
            130
        }
    };

    std::process::exit(exit_code);
}

async fn run(cli: &Cli, config: &Config) -> anyhow::Result<()> {
    let encoding = match OutputEncoding::parse(&cli.format) {
        Some(encoding) => encoding,
        None => anyhow::bail!(
            "unknown output format '{}' (expected table, csv, or json)",
            cli.format
        ),
    };
    let query = read_query(cli)?;

    let profile_name = cli.profile.as_deref().context("--profile is required")?;
    let profile = config.profile(profile_name)?;

    let service = Arc::new(HttpQueryService::new(HttpServiceConfig {
        base_url: profile
            .endpoint
            .clone()
            .unwrap_or_else(|| config.service.endpoint.clone()),
        token: profile.token.clone(),
        timeout_secs: config.service.request_timeout_secs,
        result_source: config.service.result_source,
    }));

    // Resolve local inputs before any query traffic
    let start_expr = cli.start_time.as_deref().context("--start-time is required")?;
    let range = TimeRange::resolve(start_expr, &cli.end_time, Utc::now())?;

    let resources_arg = cli.resources.as_deref().context("--resources is required")?;
    let selection =
        ResourceSelection::expand(resources_arg, service.as_ref(), config.query.max_resources)
            .await?;
    if selection.truncated() {
        eprintln!(
            "WARNING: the service caps queries at {} resources; {} excluded",
            config.query.max_resources, selection.excluded
        );
    }

    println!("Executing query across {} resource(s)", selection.len());
    println!(
        "Time range: {} to {}",
        range.start_rfc3339(),
        range.end_rfc3339()
    );
    if selection.len() <= 5 {
        for name in &selection.resolved {
            println!("  - {}", name);
        }
    }

    let engine = QueryEngine::new(
        service,
        EngineConfig {
            update_interval: Duration::from_secs(
                cli.update_interval.unwrap_or(config.query.update_interval_secs),
            ),
            limit: cli.limit.unwrap_or(config.query.limit),
            exclude_metadata: cli.exclude_metadata,
        },
    );

    let handle = submit_with_backoff(&engine, &query, &selection, range).await?;
    println!("Query ID: {}", handle.id);
    println!("Waiting for query to complete...");

    let outcome = engine.wait(&handle, print_progress).await?;
    outcome.into_result()?;

    let results = engine.retrieve(&handle).await?;
    if results.is_empty() {
        println!("No results returned from query");
        return Ok(());
    }
    println!("Retrieved {} row(s)", results.len());

    let artifact = render(&results, encoding)?;
    let destination = match &cli.output_file {
        Some(path) => Some(path.clone()),
        None if encoding.defaults_to_file() => {
            Some(PathBuf::from(artifact.default_file_name(&handle)))
        }
        None => None,
    };

    match destination {
        Some(path) => {
            artifact
                .save(&path)
                .with_context(|| format!("failed to write {:?}", path))?;
            println!("✓ Results saved to: {}", path.display());
        }
        None => print!("{}", artifact.content),
    }

    Ok(())
}

fn read_query(cli: &Cli) -> anyhow::Result<String> {
    if let Some(query) = &cli.query {
        return Ok(query.clone());
    }
    if let Some(path) = &cli.query_file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read query file {:?}", path))?;
        let text = text.trim().to_string();
        if text.is_empty() {
            anyhow::bail!("query file {:?} is empty", path);
        }
        return Ok(text);
    }
    anyhow::bail!("one of --query or --query-file is required")
}

/// Retry throttled submissions with backoff. Nothing has started running
/// remotely when submission is rejected, so resubmitting is safe; the
/// engine itself never retries.
async fn submit_with_backoff(
    engine: &QueryEngine,
    query: &str,
    selection: &ResourceSelection,
    range: TimeRange,
) -> QueryResult<QueryHandle> {
    let mut delay = Duration::from_secs(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match engine.submit(query, selection, range).await {
            Err(QueryError::RateLimited(message)) if attempt < SUBMIT_ATTEMPTS => {
                eprintln!(
                    "Submission rate limited ({}), retrying in {}s",
                    message,
                    delay.as_secs()
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            other => return other,
        }
    }
}

fn print_progress(progress: &Progress) {
    println!("[{}] Status: {}", progress.elapsed_human(), progress.status);

    let stats = &progress.statistics;
    if stats.records_scanned > 0 {
        if stats.bytes_scanned > 0 {
            println!(
                "  Scanned: {} records ({})",
                stats.records_scanned,
                format_bytes(stats.bytes_scanned)
            );
        } else {
            println!("  Scanned: {} records", stats.records_scanned);
        }
    }
    if stats.records_matched > 0 {
        println!("  Matched: {} records", stats.records_matched);
    }

    if progress.status == QueryStatus::Complete {
        println!("✓ Query completed in {}", progress.elapsed_human());
    }
}

fn format_bytes(bytes: u64) -> String {
    const MB: u64 = 1024 * 1024;
    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}

fn render_error(error: &anyhow::Error) -> String {
    match error.downcast_ref::<QueryError>() {
        Some(query_error) => format!("✗ {}: {}", query_error.kind(), query_error.message()),
        None => format!("✗ Error: {:#}", error),
    }
}

fn init_tracing(config: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("lookout={}", config.level)),
    );

    // Logs go to stderr; stdout carries query results
    if config.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_argument_wiring() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(12 * 1024 * 1024), "12.00 MB");
    }

    #[test]
    fn test_error_rendering_keeps_kind_and_message() {
        let err = anyhow::Error::new(QueryError::MalformedQuery("bad token".to_string()));
        assert_eq!(render_error(&err), "✗ MalformedQuery: bad token");

        let plain = anyhow::anyhow!("disk full");
        assert_eq!(render_error(&plain), "✗ Error: disk full");
    }
}
