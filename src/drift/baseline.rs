use crate::error::{DriftError, Result};
use crate::models::{Baseline, InstrumentKey, SideAggregate};
use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// When a tracker freezes its baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerPolicy {
    /// First snapshot observed at or after `time_of_day` in session-local time
    FixedTime {
        time_of_day: NaiveTime,
        utc_offset: FixedOffset,
    },
    /// First snapshot ever seen
    EarliestAvailable,
}

impl TriggerPolicy {
    pub fn fixed_time(time_of_day: NaiveTime, utc_offset: FixedOffset) -> Self {
        TriggerPolicy::FixedTime { time_of_day, utc_offset }
    }

    pub fn is_satisfied(&self, observed_at: DateTime<Utc>) -> bool {
        match self {
            TriggerPolicy::FixedTime { time_of_day, utc_offset } => {
                observed_at.with_timezone(utc_offset).time() >= *time_of_day
            }
            TriggerPolicy::EarliestAvailable => true,
        }
    }
}

impl fmt::Display for TriggerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TriggerPolicy::FixedTime { time_of_day, utc_offset } => {
                write!(f, "fixed_time {} {}", time_of_day.format("%H:%M:%S"), utc_offset)
            }
            TriggerPolicy::EarliestAvailable => write!(f, "earliest_available"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "baseline", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackerState {
    AwaitingTrigger,
    Captured(Baseline),
}

/// Per-instrument baseline state machine.
///
/// `AwaitingTrigger` moves to `Captured` the first time the trigger policy
/// holds. Only `reset` goes back.
#[derive(Debug, Clone)]
pub struct BaselineTracker {
    instrument: InstrumentKey,
    policy: TriggerPolicy,
    state: TrackerState,
    captures: u32,
}

impl BaselineTracker {
    pub fn new(instrument: InstrumentKey, policy: TriggerPolicy) -> Self {
        Self {
            instrument,
            policy,
            state: TrackerState::AwaitingTrigger,
            captures: 0,
        }
    }

    pub fn instrument(&self) -> InstrumentKey {
        self.instrument
    }

    pub fn policy(&self) -> TriggerPolicy {
        self.policy
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn is_captured(&self) -> bool {
        matches!(self.state, TrackerState::Captured(_))
    }

    /// Number of baselines captured over the tracker's lifetime
    pub fn captures(&self) -> u32 {
        self.captures
    }

    /// Freeze the baseline if still awaiting and the trigger holds.
    ///
    /// Returns true only on the call that captured.
    pub fn maybe_capture(&mut self, call: SideAggregate, put: SideAggregate, observed_at: DateTime<Utc>) -> bool {
        if self.is_captured() {
            return false;
        }

        if !self.policy.is_satisfied(observed_at) {
            debug!(
                instrument = %self.instrument,
                policy = %self.policy,
                %observed_at,
                "Baseline trigger not met"
            );
            return false;
        }

        let baseline = Baseline {
            call,
            put,
            captured_at: observed_at,
        };
        self.state = TrackerState::Captured(baseline);
        self.captures += 1;

        info!(
            instrument = %self.instrument,
            policy = %self.policy,
            call_vega = call.vega,
            call_theta = call.theta,
            put_vega = put.vega,
            put_theta = put.theta,
            captured_at = %observed_at,
            "Baseline captured"
        );
        true
    }

    pub fn baseline(&self) -> Result<&Baseline> {
        match &self.state {
            TrackerState::Captured(baseline) => Ok(baseline),
            TrackerState::AwaitingTrigger => Err(DriftError::NotCaptured(self.instrument)),
        }
    }

    /// Discard the baseline and wait for the trigger again
    pub fn reset(&mut self) {
        if self.is_captured() {
            info!(instrument = %self.instrument, "Baseline reset");
        }
        self.state = TrackerState::AwaitingTrigger;
    }
}
