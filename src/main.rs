use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use edgewire::app::App;
use edgewire::config::Config;
use tokio::signal;
use tracing::info;

#[derive(Parser)]
#[command(name = "edgewire", about = "Cross-venue prediction market arbitrage detection")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    config.init_logging();
    info!("edgewire starting");

    let mut app = App::new(config)?;
    app.start()?;

    signal::ctrl_c().await.context("shutdown signal")?;
    info!("Shutdown signal received");

    app.shutdown().await;
    info!("edgewire stopped");
    Ok(())
}
