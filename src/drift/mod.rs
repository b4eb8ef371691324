pub mod aggregator;
pub mod baseline;
pub mod classifier;
pub mod engine;
pub mod registry;

// Re-exports (public API)
pub use aggregator::{ChainAggregate, SnapshotAggregator, StrikeInclusion};
pub use baseline::{BaselineTracker, TrackerState, TriggerPolicy};
pub use classifier::{DEFAULT_ATM_BAND, Moneyness, classify};
pub use engine::{DriftEngine, ProcessOutcome};
pub use registry::{InstrumentRegistry, InstrumentView};
