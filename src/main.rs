use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use rsourcestatus::config;
use rsourcestatus::presence::LogSink;
use rsourcestatus::provider::ProviderRegistry;
use rsourcestatus::updater::OnlineUpdater;

#[derive(Parser)]
#[command(name = "rsourcestatus")]
#[command(about = "Game server status poller with presence formatting", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", default_value = config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    info!("Initializing configuration...");
    let config = config::load_or_init(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    config.log_summary();

    let registry = Arc::new(ProviderRegistry::new().context("failed to build status providers")?);
    let updater = OnlineUpdater::start(config.instances, registry, Arc::new(LogSink));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    updater.shutdown().await;

    Ok(())
}
