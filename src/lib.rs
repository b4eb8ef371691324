pub mod api_server_axum;
pub mod clock;
pub mod commands;
pub mod config;
pub mod drift;
pub mod error;
pub mod feed;
pub mod logging;
pub mod models;
pub mod processor;
pub mod rollover;
pub mod sinks;
pub mod utility;

// Re-exports for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AppConfig;
pub use drift::{BaselineTracker, DriftEngine, InstrumentRegistry, ProcessOutcome, TriggerPolicy};
pub use error::{DriftError, Result};
pub use models::{Baseline, ChainSnapshot, DriftResult, InstrumentKey, OptionSide, SideAggregate, StrikeQuote};
pub use processor::FrameProcessor;
