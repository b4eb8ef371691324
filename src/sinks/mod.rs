pub mod console;
pub mod file;
pub mod memory;
pub mod raw;

pub use console::ConsoleTableSink;
pub use file::JsonFileSink;
pub use memory::MemorySink;
pub use raw::RawFrameWriter;

use crate::drift::ProcessOutcome;
use crate::error::Result;
use tracing::warn;

/// Destination for processed outcomes.
///
/// Sinks only ever see shared references; whatever they keep is their own copy.
pub trait DriftSink: Send + Sync {
    fn name(&self) -> &str;

    fn emit(&self, outcome: &ProcessOutcome) -> Result<()>;
}

/// Fan-out over every registered sink
#[derive(Default)]
pub struct SinkSet {
    sinks: Vec<Box<dyn DriftSink>>,
}

impl SinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl DriftSink + 'static) -> Self {
        self.push(sink);
        self
    }

    pub fn push(&mut self, sink: impl DriftSink + 'static) {
        self.sinks.push(Box::new(sink));
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Emit to every sink; a failing sink is logged and skipped.
    ///
    /// Returns the number of sinks that failed.
    pub fn emit_all(&self, outcome: &ProcessOutcome) -> usize {
        let mut failures = 0;
        for sink in &self.sinks {
            if let Err(e) = sink.emit(outcome) {
                failures += 1;
                warn!(sink = sink.name(), instrument = %outcome.instrument(), error = %e, "Sink failed");
            }
        }
        failures
    }
}
