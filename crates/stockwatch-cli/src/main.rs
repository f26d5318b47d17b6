//! Stockwatch command-line entry point.
//!
//! Checks one or more product pages and prints each product as JSON on
//! stdout. Failures are reported on stderr and turn the exit status
//! non-zero.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use stockwatch_core::{AppConfig, FetchStrategy, RetryPolicy};
use stockwatch_scraper::{ExtractionPipeline, DEFAULT_MAX_CONCURRENT};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "stockwatch",
    about = "Check stock levels and prices of retail product pages",
    version
)]
struct Cli {
    /// Product page URLs to check.
    #[arg(required = true)]
    urls: Vec<String>,

    /// Path to a config file (defaults to the platform config directory).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Attempts per URL.
    #[arg(long)]
    max_retries: Option<u32>,

    /// How pages are fetched.
    #[arg(long, value_enum)]
    strategy: Option<Strategy>,

    /// Stop retrying once a page decodes wrongly or lacks product fields.
    #[arg(long)]
    transient_only: bool,

    /// Show the browser window.
    #[arg(long)]
    headful: bool,

    /// Number of URLs checked at once.
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENT)]
    concurrency: usize,

    /// Print one product per line instead of pretty JSON.
    #[arg(long)]
    compact: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Strategy {
    /// Harvest cookies in the browser, fetch over HTTP
    CookieReplay,
    /// Read the rendered page from the browser
    Browser,
}

impl From<Strategy> for FetchStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::CookieReplay => Self::CookieReplay,
            Strategy::Browser => Self::Browser,
        }
    }
}

/// Initialize tracing with env-filter support. Logs go to stderr so stdout
/// stays machine-readable.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,stockwatch=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Config file, then `STOCKWATCH_*` env vars, then command-line flags.
fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = AppConfig::load_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?;
            config.apply_env_overrides();
            config
        }
        None => AppConfig::load_with_env().context("failed to load configuration")?,
    };

    if let Some(max_retries) = cli.max_retries {
        config.retry.max_retries = max_retries;
    }
    if let Some(strategy) = cli.strategy {
        config.fetcher.strategy = strategy.into();
    }
    if cli.transient_only {
        config.retry.policy = RetryPolicy::TransientOnly;
    }
    if cli.headful {
        config.browser.headless = false;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing();

    info!("Starting Stockwatch v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli)?;
    let pipeline =
        ExtractionPipeline::from_config(&config).context("failed to build extraction pipeline")?;

    let results = pipeline.extract_many(&cli.urls, cli.concurrency).await;

    let mut failed = 0usize;
    for (url, result) in results {
        match result {
            Ok(product) => {
                let json = if cli.compact {
                    serde_json::to_string(&product)?
                } else {
                    serde_json::to_string_pretty(&product)?
                };
                println!("{json}");
            }
            Err(failure) => {
                failed += 1;
                tracing::debug!("{} gave up after {} attempt(s)", url, failure.attempts);
                eprintln!("{}", failure.user_message());
            }
        }
    }

    info!("Checked {} URL(s), {} failed", cli.urls.len(), failed);

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
