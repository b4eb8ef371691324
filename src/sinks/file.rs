use super::DriftSink;
use crate::drift::ProcessOutcome;
use crate::error::{DriftError, Result};
use crate::models::{DriftResult, SideAggregate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideState {
    pub vega_baseline: f64,
    pub theta_baseline: f64,
    pub vega_current: f64,
    pub theta_current: f64,
    pub vega_diff: f64,
    pub theta_diff: f64,
}

impl SideState {
    fn new(baseline: SideAggregate, current: SideAggregate) -> Self {
        Self {
            vega_baseline: baseline.vega,
            theta_baseline: baseline.theta,
            vega_current: current.vega,
            theta_current: current.theta,
            vega_diff: current.vega - baseline.vega,
            theta_diff: current.theta - baseline.theta,
        }
    }
}

/// On-disk snapshot of one drift table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableState {
    pub timestamp: DateTime<Utc>,
    pub underlying_token: u64,
    pub expiry: String,
    pub baseline_captured_at: DateTime<Utc>,
    pub calls: SideState,
    pub puts: SideState,
}

impl From<&DriftResult> for TableState {
    fn from(result: &DriftResult) -> Self {
        Self {
            timestamp: result.as_of,
            underlying_token: result.instrument.underlying_token,
            expiry: result.instrument.expiry.format("%Y-%m-%d").to_string(),
            baseline_captured_at: result.baseline.captured_at,
            calls: SideState::new(result.baseline.call, result.current_call),
            puts: SideState::new(result.baseline.put, result.current_put),
        }
    }
}

/// Writes one JSON file per drift result. Suppressed outcomes are skipped.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(result: &DriftResult) -> String {
        format!(
            "table_state_{}_{}_{}.json",
            result.as_of.format("%Y%m%dT%H%M%S%3fZ"),
            result.instrument.underlying_token,
            result.instrument.expiry.format("%Y%m%d")
        )
    }

    fn write(&self, result: &DriftResult) -> Result<PathBuf> {
        let path = self.dir.join(Self::file_name(result));
        let json = serde_json::to_string_pretty(&TableState::from(result))?;
        fs::write(&path, json).map_err(|e| DriftError::sink(self.name(), format!("{}: {}", path.display(), e)))?;
        Ok(path)
    }
}

impl DriftSink for JsonFileSink {
    fn name(&self) -> &str {
        "json_file"
    }

    fn emit(&self, outcome: &ProcessOutcome) -> Result<()> {
        if let ProcessOutcome::Drift(result) = outcome {
            let path = self.write(result)?;
            debug!(path = %path.display(), "Table state saved");
        }
        Ok(())
    }
}
