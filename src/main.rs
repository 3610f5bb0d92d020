use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use imob_feed::api::{self, AppState};
use imob_feed::config::Config;
use imob_feed::feed::{build_client, SourceFetcher};

#[derive(Parser, Debug)]
#[command(
    name = "imob-feed",
    about = "Serves Imob86 listing exports as a Meta/Google home listing catalog"
)]
struct Args {
    /// Configuration file (TOML). Missing file means defaults.
    #[arg(long, value_name = "FILE", default_value = "imob-feed.toml")]
    config: PathBuf,

    /// Listen address, overriding `bind_addr` from the config file
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (RUST_LOG controls the filter)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    let client = build_client(&config).context("Failed to build HTTP client")?;
    let fetcher =
        SourceFetcher::from_config(client, &config).context("Invalid upstream configuration")?;
    let state = AppState::new(fetcher, &config);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!(
        addr = %config.bind_addr,
        upstream = %config.upstream_base_url,
        timeout_secs = config.fetch_timeout_secs,
        "Feed service listening"
    );

    api::serve(listener, state).await.context("Server error")?;
    Ok(())
}
