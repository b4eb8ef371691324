use super::aggregator::{SnapshotAggregator, StrikeInclusion};
use super::baseline::BaselineTracker;
use crate::error::{DriftError, Result};
use crate::models::{ChainSnapshot, DriftResult, InstrumentKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What one processed snapshot produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcessOutcome {
    Drift(DriftResult),
    /// Trigger not met yet, nothing should be rendered or persisted
    SuppressedNoBaseline {
        instrument: InstrumentKey,
        as_of: DateTime<Utc>,
    },
}

impl ProcessOutcome {
    pub fn instrument(&self) -> InstrumentKey {
        match self {
            ProcessOutcome::Drift(result) => result.instrument,
            ProcessOutcome::SuppressedNoBaseline { instrument, .. } => *instrument,
        }
    }

    pub fn drift(&self) -> Option<&DriftResult> {
        match self {
            ProcessOutcome::Drift(result) => Some(result),
            ProcessOutcome::SuppressedNoBaseline { .. } => None,
        }
    }
}

/// Stateless per-snapshot pipeline: aggregate, maybe capture, diff.
///
/// All instrument state lives in the tracker handed to `process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriftEngine {
    aggregator: SnapshotAggregator,
}

impl DriftEngine {
    pub fn new(atm_band: f64, inclusion: StrikeInclusion) -> Self {
        Self {
            aggregator: SnapshotAggregator::new(atm_band, inclusion),
        }
    }

    pub fn aggregator(&self) -> &SnapshotAggregator {
        &self.aggregator
    }

    /// Reject snapshots without quotes, a usable reference price or finite greeks
    pub fn validate(snapshot: &ChainSnapshot) -> Result<()> {
        if !snapshot.reference_price.is_finite() || snapshot.reference_price <= 0.0 {
            return Err(DriftError::malformed(
                snapshot.instrument,
                format!("reference price {} is not usable", snapshot.reference_price),
            ));
        }

        if snapshot.quotes.is_empty() {
            return Err(DriftError::malformed(snapshot.instrument, "no quotes"));
        }

        if let Some(bad) = snapshot.quotes.iter().find(|q| !q.strike_price.is_finite()) {
            return Err(DriftError::malformed(
                snapshot.instrument,
                format!("strike price {} is not usable", bad.strike_price),
            ));
        }

        // Absent greeks are fine; present ones must be finite or they would poison the baseline
        let non_finite = |v: Option<f64>| v.is_some_and(|v| !v.is_finite());
        if let Some(bad) = snapshot.quotes.iter().find(|q| non_finite(q.vega) || non_finite(q.theta)) {
            return Err(DriftError::malformed(
                snapshot.instrument,
                format!("{} {} greeks are not finite", bad.strike_price, bad.side),
            ));
        }

        Ok(())
    }

    /// Run one snapshot against its instrument's tracker.
    ///
    /// A malformed snapshot fails before the tracker is touched. The call that
    /// captures the baseline returns a result with all deltas at zero.
    pub fn process(&self, snapshot: &ChainSnapshot, tracker: &mut BaselineTracker) -> Result<ProcessOutcome> {
        if tracker.instrument() != snapshot.instrument {
            return Err(DriftError::malformed(
                snapshot.instrument,
                format!("routed to tracker for {}", tracker.instrument()),
            ));
        }
        Self::validate(snapshot)?;

        let current = self.aggregator.aggregate(snapshot);
        debug!(
            instrument = %snapshot.instrument,
            reference_price = snapshot.reference_price,
            included = current.included,
            excluded = current.excluded,
            missing_greeks = current.missing_greeks,
            call_vega = current.call.vega,
            put_vega = current.put.vega,
            "Snapshot aggregated"
        );

        tracker.maybe_capture(current.call, current.put, snapshot.observed_at);

        let baseline = match tracker.baseline() {
            Ok(baseline) => *baseline,
            Err(DriftError::NotCaptured(instrument)) => {
                return Ok(ProcessOutcome::SuppressedNoBaseline {
                    instrument,
                    as_of: snapshot.observed_at,
                });
            }
            Err(e) => return Err(e),
        };

        Ok(ProcessOutcome::Drift(DriftResult::between(
            snapshot.instrument,
            current.call,
            current.put,
            baseline,
            snapshot.observed_at,
        )))
    }
}
