// ============================================
// TIMING - frame processing latency
// ============================================
// Timer::start_with_threshold("frame", 50) warns through tracing when the
// wrapped work runs over the threshold. AggregateTimer keeps running
// count/min/max/avg for the whole session.
// ============================================

use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Measures one unit of work; logs once on `stop` or drop
pub struct Timer {
    name: String,
    start: Instant,
    threshold_ms: u128,
    logged: bool,
}

impl Timer {
    /// Warns only when the elapsed time reaches `threshold_ms`; 0 logs every run at debug
    pub fn start_with_threshold(name: impl Into<String>, threshold_ms: u128) -> Self {
        Self {
            name: name.into(),
            start: Instant::now(),
            threshold_ms,
            logged: false,
        }
    }

    pub fn stop(mut self) -> Duration {
        let duration = self.start.elapsed();
        self.log_duration(duration);
        duration
    }

    fn log_duration(&mut self, duration: Duration) {
        if self.logged {
            return;
        }
        self.logged = true;

        let ms = duration.as_millis();
        if ms < self.threshold_ms {
            return;
        }

        if self.threshold_ms > 0 {
            warn!(operation = %self.name, elapsed_ms = ms as u64, threshold_ms = self.threshold_ms as u64, "Slow operation");
        } else {
            debug!(operation = %self.name, elapsed_ms = ms as u64, "Operation timed");
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        self.log_duration(duration);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimingSummary {
    pub count: usize,
    pub total_ms: f64,
    pub avg_ms: Option<f64>,
    pub min_ms: Option<f64>,
    pub max_ms: Option<f64>,
}

/// Running statistics over many timed operations
pub struct AggregateTimer {
    name: String,
    count: usize,
    total_duration: Duration,
    min_duration: Option<Duration>,
    max_duration: Option<Duration>,
}

impl AggregateTimer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            count: 0,
            total_duration: Duration::ZERO,
            min_duration: None,
            max_duration: None,
        }
    }

    pub fn record(&mut self, duration: Duration) {
        self.count += 1;
        self.total_duration += duration;
        self.min_duration = Some(self.min_duration.map_or(duration, |min| min.min(duration)));
        self.max_duration = Some(self.max_duration.map_or(duration, |max| max.max(duration)));
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn avg_duration(&self) -> Option<Duration> {
        if self.count == 0 {
            None
        } else {
            Some(self.total_duration / self.count as u32)
        }
    }

    pub fn snapshot(&self) -> TimingSummary {
        let ms = |d: Duration| d.as_micros() as f64 / 1000.0;
        TimingSummary {
            count: self.count,
            total_ms: ms(self.total_duration),
            avg_ms: self.avg_duration().map(ms),
            min_ms: self.min_duration.map(ms),
            max_ms: self.max_duration.map(ms),
        }
    }

    /// Log the summary at info level
    pub fn summary(&self) {
        if self.count == 0 {
            info!(operation = %self.name, "No operations recorded");
            return;
        }

        let s = self.snapshot();
        info!(
            operation = %self.name,
            count = s.count,
            total_ms = s.total_ms,
            avg_ms = s.avg_ms,
            min_ms = s.min_ms,
            max_ms = s.max_ms,
            "Timing summary"
        );
    }
}
