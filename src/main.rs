//! CLI entry point for the change log mirror.

use std::sync::Arc;

use anyhow::{Context, Result};
use changelog_mirror::{HttpTransport, Mirror, SharePointListSource, TracingSink};
use clap::Parser;
use tracing::{debug, info};

mod app_config;
mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(config = ?args.config, site = ?args.site, once = args.once, "CLI arguments parsed");

    let file_config = app_config::load_file_config(args.config.as_deref())?;
    let config = app_config::resolve_config(&args, file_config.as_ref())?;
    debug!(?config, "configuration resolved");

    let source = SharePointListSource::new(
        &config.site,
        &config.list,
        config.credentials.clone(),
        config.timeouts,
    )
    .context("Failed to set up the change log source")?;
    let transport = HttpTransport::new(config.timeouts, config.credentials.clone())
        .context("Failed to build the download HTTP client")?;
    let sink = Arc::new(TracingSink::new(config.settings.debug_mode));

    info!(
        list = %source.list_endpoint(),
        workers = config.settings.concurrency,
        "Change log mirror starting"
    );

    let mut mirror = Mirror::new(
        config.settings,
        Arc::new(source),
        Arc::new(transport),
        sink,
    )?;
    mirror.start().await?;

    if args.once {
        debug!("single cycle requested, draining");
    } else {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for ctrl-c")?;
        info!("Shutdown requested, finishing queued downloads");
    }

    mirror.shutdown().await?;

    let stats = mirror.stats();
    info!(
        completed = stats.completed(),
        failed = stats.failed(),
        total = stats.total(),
        abandoned = stats.abandoned(),
        cursor = ?mirror.cursor(),
        "Mirror finished"
    );

    Ok(())
}
