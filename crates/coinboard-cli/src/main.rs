/*
[INPUT]:  CLI arguments, optional YAML configuration file
[OUTPUT]: Listings board printed once, CSV download, or an interactive session
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags or startup flow
*/

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use coinboard_adapter::{ListingsClient, SnapshotCache, Timeframe};
use coinboard_cli::{BoardConfig, describe_error, export_csv, render_board, run_interactive};

#[derive(Parser, Debug)]
#[command(name = "coinboard", version, about = "Top cryptocurrency listings in the terminal")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    /// Listings page URL
    #[arg(long, value_name = "URL")]
    url: Option<String>,
    /// Rows to display (1-100)
    #[arg(long = "top", value_name = "N")]
    top_n: Option<usize>,
    /// Percent-change window: 1h, 24h or 7d
    #[arg(long, value_name = "WINDOW")]
    timeframe: Option<Timeframe>,
    /// Comma-separated symbols to keep
    #[arg(long, value_name = "SYMBOLS", value_delimiter = ',')]
    coins: Vec<String>,
    #[arg(long = "no-sort")]
    no_sort: bool,
    /// Write the filtered rows to this CSV file
    #[arg(long = "csv", value_name = "PATH")]
    csv_path: Option<PathBuf>,
    #[arg(long, short = 'i')]
    interactive: bool,
    #[arg(long = "dry-run")]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    let config = load_config(&args)?;
    config.validate().context("validate config")?;
    info!(
        url = %config.source.url,
        currency = %config.source.currency,
        ttl_secs = ?config.cache.ttl_secs,
        dry_run = args.dry_run,
        "starting coinboard"
    );

    if args.dry_run {
        info!("dry-run requested; configuration validated");
        return Ok(());
    }

    let client = ListingsClient::with_config(config.client_config()).context("build HTTP client")?;
    let cache = SnapshotCache::new(Arc::new(client)).with_policy(config.cache_policy());
    let params = config.view_params();

    if args.interactive {
        return run_interactive(&cache, &config.source, params).await;
    }

    let snapshot = match cache.get_snapshot(&config.source.url, &config.source.currency).await {
        Ok(snapshot) => snapshot,
        Err(err) => return Err(anyhow!(describe_error(&err))),
    };

    println!("{}", render_board(&snapshot, &params));

    if let Some(path) = &args.csv_path {
        let rows = export_csv(&snapshot, &params, path)?;
        println!("Wrote {rows} rows to {}", path.display());
    }

    Ok(())
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

/// File values first, then command-line overrides.
fn load_config(args: &Cli) -> Result<BoardConfig> {
    let mut config = match &args.config_path {
        Some(path) => {
            let path_str = path.to_str().context("config path must be valid utf-8")?;
            BoardConfig::from_file(path_str).context("load config")?
        }
        None => BoardConfig::default(),
    };

    if let Some(url) = &args.url {
        config.source.url = url.clone();
    }
    if let Some(top_n) = args.top_n {
        config.view.top_n = top_n;
    }
    if let Some(timeframe) = args.timeframe {
        config.view.timeframe = timeframe;
    }
    if !args.coins.is_empty() {
        config.view.coins = args
            .coins
            .iter()
            .map(|symbol| symbol.trim().to_uppercase())
            .filter(|symbol| !symbol.is_empty())
            .collect();
    }
    if args.no_sort {
        config.view.sort = false;
    }
    Ok(config)
}
