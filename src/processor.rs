use crate::config;
use crate::drift::{DriftEngine, InstrumentRegistry, ProcessOutcome};
use crate::feed::{RawFrame, decode_frame};
use crate::sinks::{RawFrameWriter, SinkSet};
use crate::utility::{AggregateTimer, Timer, TimingSummary};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Counters over everything the consumer has seen
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessStats {
    pub frames: u64,
    pub decode_failures: u64,
    pub snapshots: u64,
    pub malformed: u64,
    pub untracked: u64,
    pub drift_results: u64,
    pub suppressed: u64,
    pub sink_failures: u64,
    pub frame_write_failures: u64,
}

/// Decodes frames, runs each snapshot through the registry and fans the
/// outcomes out to the sinks. One frame is finished before the next starts.
pub struct FrameProcessor {
    engine: DriftEngine,
    registry: Arc<InstrumentRegistry>,
    sinks: SinkSet,
    frame_writer: Option<RawFrameWriter>,
    stats: ProcessStats,
    frame_timer: AggregateTimer,
}

impl FrameProcessor {
    pub fn new(engine: DriftEngine, registry: Arc<InstrumentRegistry>, sinks: SinkSet) -> Self {
        Self {
            engine,
            registry,
            sinks,
            frame_writer: None,
            stats: ProcessStats::default(),
            frame_timer: AggregateTimer::new("frame processing"),
        }
    }

    /// Dump every frame to disk before it is decoded
    pub fn with_frame_writer(mut self, writer: RawFrameWriter) -> Self {
        self.frame_writer = Some(writer);
        self
    }

    pub fn stats(&self) -> &ProcessStats {
        &self.stats
    }

    pub fn timing(&self) -> TimingSummary {
        self.frame_timer.snapshot()
    }

    /// Process one frame to completion and return its outcomes
    pub fn process_frame(&mut self, frame: &RawFrame) -> Vec<ProcessOutcome> {
        let timer = Timer::start_with_threshold("frame", config::SLOW_FRAME_THRESHOLD_MS);
        let outcomes = self.process_frame_inner(frame);
        self.frame_timer.record(timer.stop());
        outcomes
    }

    fn process_frame_inner(&mut self, frame: &RawFrame) -> Vec<ProcessOutcome> {
        self.stats.frames += 1;

        if let Some(writer) = self.frame_writer.as_mut() {
            if let Err(e) = writer.write(frame) {
                self.stats.frame_write_failures += 1;
                warn!(error = %e, "Raw frame not saved");
            }
        }

        let entries = match decode_frame(&frame.bytes, frame.received_at) {
            Ok(entries) => entries,
            Err(e) => {
                self.stats.decode_failures += 1;
                warn!(error = %e, bytes = frame.bytes.len(), "Dropping undecodable frame");
                return Vec::new();
            }
        };

        let mut outcomes = Vec::with_capacity(entries.len());
        for entry in entries {
            let snapshot = match entry {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    self.stats.malformed += 1;
                    warn!(error = %e, "Dropping malformed chain entry");
                    continue;
                }
            };

            if !self.registry.is_tracked(&snapshot.instrument) {
                self.stats.untracked += 1;
                debug!(instrument = %snapshot.instrument, "Skipping untracked instrument");
                continue;
            }

            self.stats.snapshots += 1;
            match self.registry.apply(&self.engine, &snapshot) {
                Ok(outcome) => {
                    match &outcome {
                        ProcessOutcome::Drift(_) => self.stats.drift_results += 1,
                        ProcessOutcome::SuppressedNoBaseline { .. } => self.stats.suppressed += 1,
                    }
                    self.stats.sink_failures += self.sinks.emit_all(&outcome) as u64;
                    outcomes.push(outcome);
                }
                Err(e) => {
                    self.stats.malformed += 1;
                    warn!(instrument = %snapshot.instrument, error = %e, "Snapshot rejected");
                }
            }
        }

        outcomes
    }

    /// Drain the channel until every sender is gone
    pub async fn consume(&mut self, rx: &mut mpsc::Receiver<RawFrame>) {
        while let Some(frame) = rx.recv().await {
            self.process_frame(&frame);
        }
    }

    pub fn summary(&self) {
        self.frame_timer.summary();
    }
}
