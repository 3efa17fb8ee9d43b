//! Website-Poller main entry point
//!
//! This is the command-line interface for polling the pages listed in a
//! configuration file.

use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Dispatch;
use tracing_subscriber::EnvFilter;
use website_poller::config::{load_config_with_hash, validate_page, Config};
use website_poller::poller::{build_http_client, Handler, PagePoller, PollResult, Poller};

/// Website-Poller: periodically polls web pages
///
/// Every page listed in the configuration file is requested on its own fixed
/// or randomized schedule, optionally rotating through a list of user agents.
#[derive(Parser, Debug)]
#[command(name = "website-poller")]
#[command(version = "1.0.0")]
#[command(about = "Periodically polls web pages", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Poll every page once right away instead of waiting for the first interval
    #[arg(long)]
    now: bool,

    /// Validate config and show the resolved schedule of each page without polling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let dispatch = setup_logging(cli.verbose, cli.quiet)?;

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_poll(config, cli.now, dispatch).await
}

/// Sets up the tracing subscriber based on verbosity level
///
/// The returned dispatch is handed to every poller.
fn setup_logging(verbose: u8, quiet: bool) -> anyhow::Result<Dispatch> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("website_poller=info,warn"),
            1 => EnvFilter::new("website_poller=debug,info"),
            2 => EnvFilter::new("website_poller=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .finish();

    let dispatch = Dispatch::new(subscriber);
    tracing::dispatcher::set_global_default(dispatch.clone())
        .context("failed to install tracing subscriber")?;
    Ok(dispatch)
}

/// Handles the --dry-run mode: prints the resolved settings of each page
fn handle_dry_run(config: &Config) {
    println!("=== Website-Poller Dry Run ===\n");
    println!("Request timeout: {}s\n", config.client.timeout_secs);

    let mut valid = 0;
    for page in &config.pages {
        match validate_page(page) {
            Ok(resolved) => {
                valid += 1;
                println!("{} {} {}", resolved.id, resolved.method, resolved.url);
                if resolved.plan.randomized {
                    println!(
                        "  every {}s +/- {}s",
                        resolved.plan.frequency.as_secs(),
                        resolved.plan.offset_range.as_secs()
                    );
                } else {
                    println!("  every {}s", resolved.plan.frequency.as_secs());
                }
                println!(
                    "  {} user agents ({})",
                    resolved.user_agents.len(),
                    if resolved.random_ua { "random" } else { "rotating" }
                );
            }
            Err(e) => println!("✗ {}: {}", page.url, e),
        }
    }

    println!("\n✓ {} of {} pages would be polled", valid, config.pages.len());
}

/// Polls every valid page until Ctrl-C
async fn handle_poll(config: Config, begin_immediately: bool, dispatch: Dispatch) -> anyhow::Result<()> {
    let client = Arc::new(build_http_client(Duration::from_secs(
        config.client.timeout_secs,
    ))?);

    let mut pollers: Vec<Arc<dyn Poller>> = Vec::with_capacity(config.pages.len());
    for page in &config.pages {
        match PagePoller::with_transport(page, client.clone()) {
            Ok(poller) => {
                let poller = poller.with_dispatch(dispatch.clone());
                poller.set_handler(Handler::new(log_response));
                pollers.push(Arc::new(poller));
            }
            Err(e) => {
                tracing::error!(url = %page.url, "Page contains errors, skipping: {}", e);
            }
        }
    }

    if pollers.is_empty() {
        bail!("none of the configured pages can be polled");
    }

    tracing::info!("Starting {} pollers", pollers.len());

    let root = CancellationToken::new();
    let mut tasks = JoinSet::new();
    for poller in pollers {
        let cancel = root.child_token();
        tasks.spawn(async move { poller.start(cancel, begin_immediately).await });
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    tracing::info!("Exit requested, stopping pollers");
    root.cancel();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("Poller failed: {}", e),
            Err(e) => tracing::error!("Poller task panicked: {}", e),
        }
    }

    tracing::info!("All pollers stopped");
    Ok(())
}

fn log_response(id: &str, result: PollResult) {
    match result {
        Ok(response) => tracing::info!(id, status = %response.status(), "Got response"),
        Err(e) => tracing::warn!(id, "Poll failed: {}", e),
    }
}
