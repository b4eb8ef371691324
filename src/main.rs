use anyhow::Result;
use colored::Colorize;
use greeks_drift::commands::DriftCommands;
use greeks_drift::{AppConfig, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "✗ Configuration error:".red().bold(), e);
            std::process::exit(2);
        }
    };

    let _log_guard = logging::init_logging(&config.log_dir)?;
    tracing::info!(mode = ?config.mode, "Starting greeks-drift");

    DriftCommands::run(config).await
}
