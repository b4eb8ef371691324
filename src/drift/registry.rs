use super::baseline::{BaselineTracker, TrackerState, TriggerPolicy};
use super::engine::{DriftEngine, ProcessOutcome};
use crate::error::Result;
use crate::models::{ChainSnapshot, DriftResult, InstrumentKey};
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use serde::Serialize;
use tracing::info;

#[derive(Debug)]
struct InstrumentEntry {
    tracker: BaselineTracker,
    last_result: Option<DriftResult>,
    processed: u64,
    rejected: u64,
    last_reset_at: Option<DateTime<Utc>>,
}

impl InstrumentEntry {
    fn new(key: InstrumentKey, policy: TriggerPolicy) -> Self {
        Self {
            tracker: BaselineTracker::new(key, policy),
            last_result: None,
            processed: 0,
            rejected: 0,
            last_reset_at: None,
        }
    }

    fn view(&self) -> InstrumentView {
        InstrumentView {
            instrument: self.tracker.instrument(),
            policy: self.tracker.policy().to_string(),
            tracker: *self.tracker.state(),
            last_result: self.last_result.clone(),
            snapshots_processed: self.processed,
            snapshots_rejected: self.rejected,
            last_reset_at: self.last_reset_at,
        }
    }
}

/// Read-only copy of one instrument's state for presentation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentView {
    pub instrument: InstrumentKey,
    pub policy: String,
    pub tracker: TrackerState,
    pub last_result: Option<DriftResult>,
    pub snapshots_processed: u64,
    pub snapshots_rejected: u64,
    pub last_reset_at: Option<DateTime<Utc>>,
}

/// Owns every instrument's tracker and last drift result.
///
/// Trackers never leave the map; callers mutate them through closures run
/// under the per-key lock, so each instrument has exactly one live tracker.
/// Distinct keys live in separate shards and can be processed concurrently.
#[derive(Debug)]
pub struct InstrumentRegistry {
    entries: DashMap<InstrumentKey, InstrumentEntry>,
    tracked: DashSet<InstrumentKey>,
    default_policy: TriggerPolicy,
}

impl InstrumentRegistry {
    pub fn new(default_policy: TriggerPolicy) -> Self {
        Self {
            entries: DashMap::new(),
            tracked: DashSet::new(),
            default_policy,
        }
    }

    pub fn default_policy(&self) -> TriggerPolicy {
        self.default_policy
    }

    /// Register an instrument up front and restrict processing to the tracked set
    pub fn track(&self, key: InstrumentKey) {
        self.tracked.insert(key);
        self.entries
            .entry(key)
            .or_insert_with(|| InstrumentEntry::new(key, self.default_policy));
    }

    /// True when no tracked set is configured or `key` is in it
    pub fn is_tracked(&self, key: &InstrumentKey) -> bool {
        self.tracked.is_empty() || self.tracked.contains(key)
    }

    /// Run `f` on the instrument's tracker, creating it with `policy` if absent
    pub fn get_or_create<R>(
        &self,
        key: InstrumentKey,
        policy: TriggerPolicy,
        f: impl FnOnce(&mut BaselineTracker) -> R,
    ) -> R {
        let mut entry = self
            .entries
            .entry(key)
            .or_insert_with(|| InstrumentEntry::new(key, policy));
        f(&mut entry.tracker)
    }

    /// Process one snapshot against its instrument and keep the result.
    ///
    /// A drift result replaces the previous one; a rejected snapshot leaves
    /// the previous result and the tracker as they were. A snapshot for an
    /// unknown instrument creates its entry only once it has passed validation.
    pub fn apply(&self, engine: &DriftEngine, snapshot: &ChainSnapshot) -> Result<ProcessOutcome> {
        let key = snapshot.instrument;
        if let Err(e) = DriftEngine::validate(snapshot) {
            if let Some(mut entry) = self.entries.get_mut(&key) {
                entry.rejected += 1;
            }
            return Err(e);
        }

        let mut entry = self
            .entries
            .entry(key)
            .or_insert_with(|| InstrumentEntry::new(key, self.default_policy));

        match engine.process(snapshot, &mut entry.tracker) {
            Ok(outcome) => {
                entry.processed += 1;
                if let ProcessOutcome::Drift(result) = &outcome {
                    entry.last_result = Some(result.clone());
                }
                Ok(outcome)
            }
            Err(e) => {
                entry.rejected += 1;
                Err(e)
            }
        }
    }

    pub fn reset(&self, key: &InstrumentKey, at: DateTime<Utc>) -> bool {
        match self.entries.get_mut(key) {
            Some(mut entry) => {
                entry.tracker.reset();
                entry.last_result = None;
                entry.last_reset_at = Some(at);
                true
            }
            None => false,
        }
    }

    /// Day-rollover hook: every tracker back to awaiting, results dropped
    pub fn reset_all(&self, at: DateTime<Utc>) -> usize {
        let mut count = 0;
        for mut entry in self.entries.iter_mut() {
            entry.tracker.reset();
            entry.last_result = None;
            entry.last_reset_at = Some(at);
            count += 1;
        }
        info!(instruments = count, %at, "Reset all baselines");
        count
    }

    /// Visit every instrument.
    ///
    /// `f` runs while the map's shard read locks are held: calling `apply`,
    /// `reset`, `reset_all`, `track` or `get_or_create` from inside it deadlocks.
    /// Use `views()` when the entries need to outlive the visit.
    pub fn for_each(&self, mut f: impl FnMut(&InstrumentKey, &BaselineTracker, Option<&DriftResult>)) {
        for entry in self.entries.iter() {
            f(entry.key(), &entry.tracker, entry.last_result.as_ref());
        }
    }

    pub fn last_result(&self, key: &InstrumentKey) -> Option<DriftResult> {
        self.entries.get(key).and_then(|e| e.last_result.clone())
    }

    pub fn view(&self, key: &InstrumentKey) -> Option<InstrumentView> {
        self.entries.get(key).map(|e| e.view())
    }

    /// All instruments, ordered by key
    pub fn views(&self) -> Vec<InstrumentView> {
        let mut views: Vec<InstrumentView> = self.entries.iter().map(|e| e.view()).collect();
        views.sort_by_key(|v| v.instrument);
        views
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
