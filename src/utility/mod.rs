pub mod timing;

pub use timing::{AggregateTimer, TimingSummary, Timer};
