use crate::drift::{DEFAULT_ATM_BAND, DriftEngine, StrikeInclusion, TriggerPolicy};
use crate::error::{DriftError, Result};
use crate::models::InstrumentKey;
use chrono::{FixedOffset, NaiveTime};
use std::path::PathBuf;
use std::time::Duration;

// -----------------------------------------------
// FEED ENDPOINT
// -----------------------------------------------
pub const DEFAULT_FEED_URL: &str = "wss://wsrelay.sensibull.com/broker/1?consumerType=platform_no_plan";
pub const FEED_ORIGIN: &str = "https://web.sensibull.com";
pub const SUBSCRIBE_BROKER_ID: u32 = 1;
pub const SUBSCRIBE_DATA_SOURCE: &str = "option-chain";

// Frames buffered between the socket reader and the processing loop
pub const FEED_CHANNEL_CAPACITY: usize = 1024;

// -----------------------------------------------
// RECONNECT
// -----------------------------------------------
pub const RECONNECT_BASE_DELAY_MS: u64 = 250;
pub const RECONNECT_FACTOR: u64 = 2;
pub const RECONNECT_MAX_DELAY_SECS: u64 = 30;
pub const RECONNECT_MAX_ATTEMPTS: usize = 10;

// -----------------------------------------------
// BASELINE
// -----------------------------------------------
pub const DEFAULT_BASELINE_TIME: &str = "09:15:00";
pub const DEFAULT_SESSION_UTC_OFFSET_MINUTES: i32 = 330; // IST

// -----------------------------------------------
// ROLLOVER / PROCESSING
// -----------------------------------------------
pub const ROLLOVER_CHECK_INTERVAL: Duration = Duration::from_secs(30);
pub const SLOW_FRAME_THRESHOLD_MS: u128 = 50;

// -----------------------------------------------
// OUTPUT
// -----------------------------------------------
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_OUTPUT_DIR: &str = "scrapped_data";
pub const DEFAULT_LOG_DIR: &str = "./logs";
pub const LOG_FILE_NAME: &str = "greeks-drift.log";

// -----------------------------------------------
// ENVIRONMENT VARIABLES
// -----------------------------------------------
pub const ENV_MODE: &str = "GREEKS_MODE";
pub const ENV_ATM_BAND: &str = "GREEKS_ATM_BAND";
pub const ENV_BASELINE_MODE: &str = "GREEKS_BASELINE_MODE";
pub const ENV_BASELINE_TIME: &str = "GREEKS_BASELINE_TIME";
pub const ENV_SESSION_OFFSET: &str = "GREEKS_SESSION_UTC_OFFSET_MINUTES";
pub const ENV_INSTRUMENTS: &str = "GREEKS_INSTRUMENTS";
pub const ENV_STRIKE_INCLUSION: &str = "GREEKS_STRIKE_INCLUSION";
pub const ENV_FEED_URL: &str = "GREEKS_FEED_URL";
pub const ENV_PORT: &str = "GREEKS_PORT";
pub const ENV_OUTPUT_DIR: &str = "GREEKS_OUTPUT_DIR";
pub const ENV_CONSOLE: &str = "GREEKS_CONSOLE";
pub const ENV_SAVE_FRAMES: &str = "GREEKS_SAVE_FRAMES";
pub const ENV_LOG_DIR: &str = "GREEKS_LOG_DIR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Websocket feed plus HTTP query endpoint
    Live,
    /// Newline-delimited JSON frames on stdin
    Pipe,
    /// Websocket feed behind the HTTP endpoint, no console table
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaselineTriggerMode {
    FixedTime,
    EarliestAvailable,
}

/// Runtime configuration, read from `GREEKS_*` environment variables
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mode: RunMode,
    pub atm_band: f64,
    pub trigger_mode: BaselineTriggerMode,
    pub baseline_time: Option<NaiveTime>,
    pub session_offset: FixedOffset,
    pub tracked_instruments: Vec<InstrumentKey>,
    pub strike_inclusion: StrikeInclusion,
    pub feed_url: String,
    /// 0 disables the HTTP endpoint
    pub port: u16,
    pub output_dir: Option<PathBuf>,
    pub console: bool,
    /// Dump every inbound frame into `output_dir` before processing
    pub save_frames: bool,
    pub log_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (the environment in production, a map in tests)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mode = match get(ENV_MODE).as_deref().unwrap_or("live") {
            "live" => RunMode::Live,
            "pipe" => RunMode::Pipe,
            "server" => RunMode::Server,
            other => return Err(DriftError::Config(format!("Unknown mode '{}' (live, pipe, server)", other))),
        };

        let atm_band = match get(ENV_ATM_BAND) {
            Some(v) => v
                .parse::<f64>()
                .map_err(|e| DriftError::Config(format!("Bad {} '{}': {}", ENV_ATM_BAND, v, e)))?,
            None => DEFAULT_ATM_BAND,
        };

        let trigger_mode = match get(ENV_BASELINE_MODE).as_deref().unwrap_or("fixed_time") {
            "fixed_time" => BaselineTriggerMode::FixedTime,
            "earliest_available" => BaselineTriggerMode::EarliestAvailable,
            other => {
                return Err(DriftError::Config(format!(
                    "Unknown baseline mode '{}' (fixed_time, earliest_available)",
                    other
                )));
            }
        };

        let baseline_time = match trigger_mode {
            BaselineTriggerMode::FixedTime => {
                let raw = get(ENV_BASELINE_TIME).unwrap_or_else(|| DEFAULT_BASELINE_TIME.to_string());
                Some(parse_time_of_day(&raw)?)
            }
            BaselineTriggerMode::EarliestAvailable => None,
        };

        let offset_minutes = match get(ENV_SESSION_OFFSET) {
            Some(v) => v
                .parse::<i32>()
                .map_err(|e| DriftError::Config(format!("Bad {} '{}': {}", ENV_SESSION_OFFSET, v, e)))?,
            None => DEFAULT_SESSION_UTC_OFFSET_MINUTES,
        };
        let session_offset = FixedOffset::east_opt(offset_minutes * 60)
            .ok_or_else(|| DriftError::Config(format!("Session offset {} minutes is out of range", offset_minutes)))?;

        let tracked_instruments = match get(ENV_INSTRUMENTS) {
            Some(v) => parse_instruments(&v)?,
            None => Vec::new(),
        };

        let strike_inclusion = match get(ENV_STRIKE_INCLUSION).as_deref().unwrap_or("near_the_money") {
            "near_the_money" => StrikeInclusion::NearTheMoney,
            "all_strikes" => StrikeInclusion::AllStrikes,
            other => {
                return Err(DriftError::Config(format!(
                    "Unknown strike inclusion '{}' (near_the_money, all_strikes)",
                    other
                )));
            }
        };

        let port = match get(ENV_PORT) {
            Some(v) => v
                .parse::<u16>()
                .map_err(|e| DriftError::Config(format!("Bad {} '{}': {}", ENV_PORT, v, e)))?,
            None => DEFAULT_PORT,
        };

        // Set-but-empty disables the file sink
        let output_dir = match lookup(ENV_OUTPUT_DIR) {
            Some(v) if v.trim().is_empty() => None,
            Some(v) => Some(PathBuf::from(v.trim())),
            None => Some(PathBuf::from(DEFAULT_OUTPUT_DIR)),
        };

        let console = parse_flag(ENV_CONSOLE, get(ENV_CONSOLE).as_deref(), true)?;
        let save_frames = parse_flag(ENV_SAVE_FRAMES, get(ENV_SAVE_FRAMES).as_deref(), false)?;

        let config = Self {
            mode,
            atm_band,
            trigger_mode,
            baseline_time,
            session_offset,
            tracked_instruments,
            strike_inclusion,
            feed_url: get(ENV_FEED_URL).unwrap_or_else(|| DEFAULT_FEED_URL.to_string()),
            port,
            output_dir,
            console,
            save_frames,
            log_dir: PathBuf::from(get(ENV_LOG_DIR).unwrap_or_else(|| DEFAULT_LOG_DIR.to_string())),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.atm_band.is_finite() || self.atm_band < 0.0 {
            return Err(DriftError::Config(format!("ATM band {} must be finite and >= 0", self.atm_band)));
        }

        if self.trigger_mode == BaselineTriggerMode::FixedTime && self.baseline_time.is_none() {
            return Err(DriftError::Config("Fixed-time baseline needs a time of day".to_string()));
        }

        if self.save_frames && self.output_dir.is_none() {
            return Err(DriftError::Config(format!(
                "{} needs an output directory ({})",
                ENV_SAVE_FRAMES, ENV_OUTPUT_DIR
            )));
        }

        let streams = matches!(self.mode, RunMode::Live | RunMode::Server);

        if streams && self.tracked_instruments.is_empty() {
            return Err(DriftError::Config(format!(
                "{:?} mode needs at least one instrument in {}",
                self.mode, ENV_INSTRUMENTS
            )));
        }

        if self.mode == RunMode::Server && self.port == 0 {
            return Err(DriftError::Config(format!("Server mode needs a non-zero {}", ENV_PORT)));
        }

        if streams && !self.feed_url.starts_with("ws://") && !self.feed_url.starts_with("wss://") {
            return Err(DriftError::Config(format!("Feed URL '{}' is not a websocket URL", self.feed_url)));
        }

        Ok(())
    }

    pub fn trigger_policy(&self) -> TriggerPolicy {
        match (self.trigger_mode, self.baseline_time) {
            (BaselineTriggerMode::FixedTime, Some(time_of_day)) => {
                TriggerPolicy::fixed_time(time_of_day, self.session_offset)
            }
            // validate() rules out FixedTime without a time
            _ => TriggerPolicy::EarliestAvailable,
        }
    }

    pub fn engine(&self) -> DriftEngine {
        DriftEngine::new(self.atm_band, self.strike_inclusion)
    }
}

fn parse_flag(name: &str, raw: Option<&str>, default: bool) -> Result<bool> {
    match raw {
        None => Ok(default),
        Some("true") | Some("1") | Some("yes") => Ok(true),
        Some("false") | Some("0") | Some("no") => Ok(false),
        Some(other) => Err(DriftError::Config(format!("Bad {} '{}'", name, other))),
    }
}

/// Accepts `HH:MM:SS` or `HH:MM`
pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|e| DriftError::Config(format!("Bad time of day '{}': {}", raw, e)))
}

/// Comma-separated `token:YYYY-MM-DD` list
pub fn parse_instruments(raw: &str) -> Result<Vec<InstrumentKey>> {
    let mut keys = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let key: InstrumentKey = part.parse()?;
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    Ok(keys)
}
