use crate::error::DriftError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Sub;
use std::str::FromStr;

/// Underlying token + expiry, the registry key for one option chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstrumentKey {
    pub underlying_token: u64,
    pub expiry: NaiveDate,
}

impl InstrumentKey {
    pub fn new(underlying_token: u64, expiry: NaiveDate) -> Self {
        Self { underlying_token, expiry }
    }
}

impl fmt::Display for InstrumentKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}@{}", self.underlying_token, self.expiry.format("%Y-%m-%d"))
    }
}

/// Parses `token:YYYY-MM-DD` (the config form, e.g. `256265:2024-10-10`)
impl FromStr for InstrumentKey {
    type Err = DriftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (token, expiry) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| DriftError::Config(format!("Instrument '{}' is not token:YYYY-MM-DD", s)))?;

        let underlying_token = token
            .trim()
            .parse::<u64>()
            .map_err(|e| DriftError::Config(format!("Bad underlying token '{}': {}", token, e)))?;
        let expiry = NaiveDate::parse_from_str(expiry.trim(), "%Y-%m-%d")
            .map_err(|e| DriftError::Config(format!("Bad expiry '{}': {}", expiry, e)))?;

        Ok(Self { underlying_token, expiry })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionSide {
    #[serde(rename = "CE")]
    Call,
    #[serde(rename = "PE")]
    Put,
}

impl fmt::Display for OptionSide {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OptionSide::Call => write!(f, "CE"),
            OptionSide::Put => write!(f, "PE"),
        }
    }
}

/// One side of one strike as received from the feed.
///
/// Greeks stay `None` when the feed omitted them; they only turn into zero at
/// the point of summation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrikeQuote {
    pub strike_price: f64,
    pub side: OptionSide,
    #[serde(default)]
    pub vega: Option<f64>,
    #[serde(default)]
    pub theta: Option<f64>,
}

impl StrikeQuote {
    pub fn new(strike_price: f64, side: OptionSide, vega: f64, theta: f64) -> Self {
        Self {
            strike_price,
            side,
            vega: Some(vega),
            theta: Some(theta),
        }
    }

    pub fn without_greeks(strike_price: f64, side: OptionSide) -> Self {
        Self {
            strike_price,
            side,
            vega: None,
            theta: None,
        }
    }

    pub fn has_greeks(&self) -> bool {
        self.vega.is_some() || self.theta.is_some()
    }

    /// Vega/Theta to add to a side aggregate, absent fields as zero
    pub fn contribution(&self) -> SideAggregate {
        SideAggregate {
            vega: self.vega.unwrap_or(0.0),
            theta: self.theta.unwrap_or(0.0),
        }
    }
}

/// One decoded option chain for one instrument at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub instrument: InstrumentKey,
    pub reference_price: f64,
    pub quotes: Vec<StrikeQuote>,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SideAggregate {
    pub vega: f64,
    pub theta: f64,
}

impl SideAggregate {
    pub fn new(vega: f64, theta: f64) -> Self {
        Self { vega, theta }
    }

    pub fn add(&mut self, other: SideAggregate) {
        self.vega += other.vega;
        self.theta += other.theta;
    }
}

impl Sub for SideAggregate {
    type Output = SideAggregate;

    fn sub(self, rhs: SideAggregate) -> SideAggregate {
        SideAggregate {
            vega: self.vega - rhs.vega,
            theta: self.theta - rhs.theta,
        }
    }
}

/// Frozen aggregates used as the zero point for drift
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub call: SideAggregate,
    pub put: SideAggregate,
    pub captured_at: DateTime<Utc>,
}

/// Signed drift of the current aggregates against the baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftResult {
    pub instrument: InstrumentKey,
    pub call_vega_delta: f64,
    pub call_theta_delta: f64,
    pub put_vega_delta: f64,
    pub put_theta_delta: f64,
    pub current_call: SideAggregate,
    pub current_put: SideAggregate,
    pub baseline: Baseline,
    pub as_of: DateTime<Utc>,
}

impl DriftResult {
    pub fn between(
        instrument: InstrumentKey,
        current_call: SideAggregate,
        current_put: SideAggregate,
        baseline: Baseline,
        as_of: DateTime<Utc>,
    ) -> Self {
        let call = current_call - baseline.call;
        let put = current_put - baseline.put;

        Self {
            instrument,
            call_vega_delta: call.vega,
            call_theta_delta: call.theta,
            put_vega_delta: put.vega,
            put_theta_delta: put.theta,
            current_call,
            current_put,
            baseline,
            as_of,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.call_vega_delta == 0.0
            && self.call_theta_delta == 0.0
            && self.put_vega_delta == 0.0
            && self.put_theta_delta == 0.0
    }
}
