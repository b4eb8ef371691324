use super::DriftSink;
use crate::drift::ProcessOutcome;
use crate::error::Result;
use std::sync::{Arc, Mutex};

/// Keeps every outcome in memory; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    outcomes: Arc<Mutex<Vec<ProcessOutcome>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcomes(&self) -> Vec<ProcessOutcome> {
        self.outcomes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.outcomes.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DriftSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn emit(&self, outcome: &ProcessOutcome) -> Result<()> {
        self.outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(outcome.clone());
        Ok(())
    }
}
