use crate::clock::Clock;
use crate::drift::InstrumentRegistry;
use chrono::{FixedOffset, NaiveDate};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Resets every baseline when the session-local date changes
pub struct RolloverScheduler {
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
    registry: Arc<InstrumentRegistry>,
    last_date: NaiveDate,
}

impl RolloverScheduler {
    pub fn new(clock: Arc<dyn Clock>, offset: FixedOffset, registry: Arc<InstrumentRegistry>) -> Self {
        let last_date = clock.now().with_timezone(&offset).date_naive();
        Self {
            clock,
            offset,
            registry,
            last_date,
        }
    }

    pub fn session_date(&self) -> NaiveDate {
        self.last_date
    }

    /// Returns true when a rollover happened on this check
    pub fn check(&mut self) -> bool {
        let now = self.clock.now();
        let today = now.with_timezone(&self.offset).date_naive();
        if today == self.last_date {
            return false;
        }

        info!(from = %self.last_date, to = %today, "Session date changed, resetting baselines");
        self.registry.reset_all(now);
        self.last_date = today;
        true
    }

    pub async fn run(mut self, interval: Duration, stop: Arc<AtomicBool>) {
        let mut ticker = tokio::time::interval(interval);
        debug!(clock = self.clock.name(), date = %self.last_date, "Rollover scheduler started");

        loop {
            ticker.tick().await;
            if stop.load(Ordering::SeqCst) {
                debug!("Rollover scheduler stopping");
                return;
            }
            self.check();
        }
    }
}
