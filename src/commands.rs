use crate::api_server_axum;
use crate::clock::{Clock, SystemClock};
use crate::config::{self, AppConfig, RunMode};
use crate::drift::InstrumentRegistry;
use crate::feed::{OptionChainFeed, RawFrame, stdin};
use crate::processor::FrameProcessor;
use crate::rollover::RolloverScheduler;
use crate::sinks::{ConsoleTableSink, JsonFileSink, RawFrameWriter, SinkSet};

use anyhow::{Context, Result};
use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Drift command handler - wires feed, engine, sinks and HTTP endpoint per run mode
pub struct DriftCommands;

impl DriftCommands {
    pub async fn run(config: AppConfig) -> Result<()> {
        match config.mode {
            RunMode::Live => Self::run_live(config).await,
            RunMode::Pipe => Self::run_pipe(config).await,
            RunMode::Server => Self::run_server(config).await,
        }
    }

    /// Websocket feed, console table, optional HTTP endpoint
    pub async fn run_live(config: AppConfig) -> Result<()> {
        Self::banner("Greeks Drift - Live Feed", &config);
        Self::stream(config).await
    }

    /// Websocket feed behind the HTTP endpoint, console table off
    pub async fn run_server(mut config: AppConfig) -> Result<()> {
        config.console = false;
        Self::banner("Greeks Drift - API Server", &config);
        Self::stream(config).await
    }

    /// Newline-delimited frames from stdin until EOF
    pub async fn run_pipe(config: AppConfig) -> Result<()> {
        Self::banner("Greeks Drift - Pipe", &config);

        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
        let registry = Self::build_registry(&config);
        let mut processor = Self::build_processor(&config, registry)?;

        let (tx, mut rx) = mpsc::channel::<RawFrame>(config::FEED_CHANNEL_CAPACITY);
        let reader = tokio::spawn(async move {
            stdin::read_frames(BufReader::new(tokio::io::stdin()), clock, tx).await
        });

        processor.consume(&mut rx).await;

        let forwarded = reader
            .await
            .context("stdin reader panicked")?
            .context("Failed reading frames from stdin")?;
        info!(forwarded, "Pipe input finished");

        Self::finish(&processor);
        Ok(())
    }

    async fn stream(config: AppConfig) -> Result<()> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
        let registry = Self::build_registry(&config);
        let mut processor = Self::build_processor(&config, registry.clone())?;

        let (tx, mut rx) = mpsc::channel::<RawFrame>(config::FEED_CHANNEL_CAPACITY);
        let mut feed = OptionChainFeed::new(&config.feed_url, &config.tracked_instruments, clock.clone(), tx);
        let feed_stop = feed.stop_handle();
        let feed_task = tokio::spawn(async move {
            let result = feed.run().await;
            info!(
                frames = feed.stats().frames_received,
                reconnects = feed.stats().reconnects,
                "Feed finished"
            );
            result
        });

        let rollover_stop = Arc::new(AtomicBool::new(false));
        let scheduler = RolloverScheduler::new(clock.clone(), config.session_offset, registry.clone());
        let rollover_task = tokio::spawn(scheduler.run(config::ROLLOVER_CHECK_INTERVAL, rollover_stop.clone()));

        if config.port != 0 {
            let port = config.port;
            let registry = registry.clone();
            let clock = clock.clone();
            tokio::spawn(async move {
                if let Err(e) = api_server_axum::start_server(port, registry, clock).await {
                    error!(port, error = %e, "API server stopped");
                }
            });
            println!("{} API listening on http://127.0.0.1:{}", "ℹ".blue(), port);
        }

        tokio::select! {
            _ = processor.consume(&mut rx) => {
                info!("Frame channel closed");
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\n{} Interrupt received, shutting down", "⚠".yellow());
            }
        }

        feed_stop.store(true, Ordering::SeqCst);
        rollover_stop.store(true, Ordering::SeqCst);
        rollover_task.abort();
        // The feed may be parked on a socket read; abort rather than wait for the next frame.
        feed_task.abort();

        if let Ok(Ok(Err(e))) = tokio::time::timeout(std::time::Duration::from_millis(100), feed_task).await {
            error!(error = %e, "Feed gave up");
            Self::finish(&processor);
            return Err(e).context("Option chain feed failed");
        }

        Self::finish(&processor);
        Ok(())
    }

    pub fn build_registry(config: &AppConfig) -> Arc<InstrumentRegistry> {
        let registry = Arc::new(InstrumentRegistry::new(config.trigger_policy()));
        for key in &config.tracked_instruments {
            registry.track(*key);
        }
        registry
    }

    pub fn build_sinks(config: &AppConfig) -> Result<SinkSet> {
        let mut sinks = SinkSet::new();
        if config.console {
            sinks.push(ConsoleTableSink::new());
        }
        if let Some(dir) = &config.output_dir {
            let sink = JsonFileSink::new(dir)
                .with_context(|| format!("Cannot create output directory {}", dir.display()))?;
            sinks.push(sink);
        }
        Ok(sinks)
    }

    /// Engine and sinks from config, plus the raw frame dump when enabled
    pub fn build_processor(config: &AppConfig, registry: Arc<InstrumentRegistry>) -> Result<FrameProcessor> {
        let processor = FrameProcessor::new(config.engine(), registry, Self::build_sinks(config)?);
        match &config.output_dir {
            Some(dir) if config.save_frames => {
                let writer = RawFrameWriter::new(dir)
                    .with_context(|| format!("Cannot create output directory {}", dir.display()))?;
                Ok(processor.with_frame_writer(writer))
            }
            _ => Ok(processor),
        }
    }

    fn banner(title: &str, config: &AppConfig) {
        println!("{}", "=".repeat(60).blue());
        println!("{}", title.green().bold());
        println!("{}", "=".repeat(60).blue());
        println!("{} Baseline policy: {}", "ℹ".blue(), config.trigger_policy().to_string().yellow());
        println!("{} ATM band: {}", "ℹ".blue(), config.atm_band);
        println!("{} Strikes: {:?}", "ℹ".blue(), config.strike_inclusion);
        if config.tracked_instruments.is_empty() {
            println!("{} Instruments: all in feed", "ℹ".blue());
        } else {
            let keys: Vec<String> = config.tracked_instruments.iter().map(|k| k.to_string()).collect();
            println!("{} Instruments: {}", "ℹ".blue(), keys.join(", ").yellow());
        }
        if let Some(dir) = &config.output_dir {
            println!("{} Table states: {}", "ℹ".blue(), dir.display());
            if config.save_frames {
                println!("{} Raw frames: {}", "ℹ".blue(), dir.display());
            }
        }
        println!();
    }

    fn finish(processor: &FrameProcessor) {
        let stats = processor.stats();
        processor.summary();

        println!("\n{}", "=".repeat(60).blue());
        println!("{}", "Summary".cyan().bold());
        println!("{}", "=".repeat(60).blue());
        println!("{} Frames: {}", "✓".green(), stats.frames);
        println!("{} Snapshots: {}", "✓".green(), stats.snapshots);
        println!("{} Drift results: {}", "✓".green(), stats.drift_results);
        println!("{} Awaiting baseline: {}", "⏱".yellow(), stats.suppressed);
        println!("{} Undecodable frames: {}", "✗".red(), stats.decode_failures);
        println!("{} Malformed snapshots: {}", "✗".red(), stats.malformed);
        if stats.frame_write_failures > 0 {
            println!("{} Raw frames not saved: {}", "⚠".yellow(), stats.frame_write_failures);
        }
        if stats.sink_failures > 0 {
            println!("{} Sink failures: {}", "⚠".yellow(), stats.sink_failures);
        }
        println!("{}", "=".repeat(60).blue());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InstrumentKey;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_build_sinks_and_registry() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("tables").display().to_string();
        let env: HashMap<&str, String> = HashMap::from([
            (config::ENV_MODE, "pipe".to_string()),
            (config::ENV_INSTRUMENTS, "256265:2024-10-10,260105:2024-10-09".to_string()),
            (config::ENV_OUTPUT_DIR, out),
            (config::ENV_CONSOLE, "false".to_string()),
        ]);
        let config = AppConfig::from_lookup(|k| env.get(k).cloned()).unwrap();

        let sinks = DriftCommands::build_sinks(&config).unwrap();
        assert_eq!(sinks.names(), vec!["json_file"]);
        assert!(tmp.path().join("tables").is_dir());

        let registry = DriftCommands::build_registry(&config);
        assert_eq!(registry.len(), 2);
        assert!(registry.is_tracked(&"256265:2024-10-10".parse::<InstrumentKey>().unwrap()));
        assert!(!registry.is_tracked(&"256265:2024-10-17".parse::<InstrumentKey>().unwrap()));
    }

    #[test]
    fn test_build_processor_saves_raw_frames_when_enabled() {
        let tmp = TempDir::new().unwrap();
        let env: HashMap<&str, String> = HashMap::from([
            (config::ENV_MODE, "pipe".to_string()),
            (config::ENV_OUTPUT_DIR, tmp.path().display().to_string()),
            (config::ENV_CONSOLE, "false".to_string()),
            (config::ENV_SAVE_FRAMES, "true".to_string()),
        ]);
        let config = AppConfig::from_lookup(|k| env.get(k).cloned()).unwrap();

        let mut processor = DriftCommands::build_processor(&config, DriftCommands::build_registry(&config)).unwrap();
        processor.process_frame(&RawFrame::new("not json", chrono::Utc::now()));

        let saved: Vec<String> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(saved.len(), 1);
        assert!(saved[0].starts_with("websocket_output_"));
    }
}
