//! Pulse dashboard feed - entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Real-time instrument catalog and column views
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via PULSE_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    pulse_ws::init_crypto();

    let args = Args::parse();

    pulse_telemetry::init_logging()?;

    info!("Starting pulse v{}", env!("CARGO_PKG_VERSION"));

    // Config path: CLI arg > PULSE_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("PULSE_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = pulse_app::AppConfig::from_file(&config_path)?;
    info!(mode = ?config.mode, columns = config.columns.len(), "Configuration loaded");

    let app = pulse_app::Application::new(config)?;
    app.run().await?;

    Ok(())
}
