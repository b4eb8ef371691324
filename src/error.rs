use crate::models::InstrumentKey;
use thiserror::Error;

/// Errors raised by the drift pipeline.
///
/// Configuration errors stop the binary at startup. Everything else is scoped to a single
/// frame, snapshot or sink call and leaves instrument state untouched.
#[derive(Debug, Error)]
pub enum DriftError {
    /// Inbound frame could not be turned into structured snapshots.
    #[error("Decode failure: {0}")]
    DecodeFailure(String),

    /// Baseline requested before the trigger fired.
    #[error("Baseline not captured for {0}")]
    NotCaptured(InstrumentKey),

    /// Snapshot missing its quotes or reference price.
    #[error("Malformed snapshot for {instrument}: {reason}")]
    MalformedSnapshot { instrument: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Sink '{sink}' failed: {reason}")]
    Sink { sink: String, reason: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DriftError {
    pub fn malformed(instrument: impl ToString, reason: impl Into<String>) -> Self {
        DriftError::MalformedSnapshot {
            instrument: instrument.to_string(),
            reason: reason.into(),
        }
    }

    pub fn sink(sink: &str, reason: impl ToString) -> Self {
        DriftError::Sink {
            sink: sink.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DriftError>;
