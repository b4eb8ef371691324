use super::classifier::{DEFAULT_ATM_BAND, Moneyness, classify};
use crate::models::{ChainSnapshot, OptionSide, SideAggregate, StrikeQuote};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Which strikes feed the side aggregates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrikeInclusion {
    /// ATM and OTM strikes only
    #[default]
    NearTheMoney,
    /// Every strike regardless of moneyness
    AllStrikes,
}

impl StrikeInclusion {
    pub fn includes(&self, moneyness: Moneyness) -> bool {
        match self {
            StrikeInclusion::NearTheMoney => moneyness != Moneyness::InTheMoney,
            StrikeInclusion::AllStrikes => true,
        }
    }
}

/// Per-side sums for one snapshot plus bookkeeping about what was visited
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainAggregate {
    pub call: SideAggregate,
    pub put: SideAggregate,
    pub included: usize,
    pub excluded: usize,
    pub missing_greeks: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotAggregator {
    atm_band: f64,
    inclusion: StrikeInclusion,
}

impl Default for SnapshotAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_ATM_BAND, StrikeInclusion::NearTheMoney)
    }
}

impl SnapshotAggregator {
    pub fn new(atm_band: f64, inclusion: StrikeInclusion) -> Self {
        Self { atm_band, inclusion }
    }

    pub fn atm_band(&self) -> f64 {
        self.atm_band
    }

    pub fn inclusion(&self) -> StrikeInclusion {
        self.inclusion
    }

    /// Sum Vega/Theta per side over the included strikes of a snapshot.
    ///
    /// Quotes are visited in ascending strike order regardless of input order
    /// so rounding is reproducible. Quotes without Greeks are still classified.
    pub fn aggregate(&self, snapshot: &ChainSnapshot) -> ChainAggregate {
        let mut ordered: Vec<&StrikeQuote> = snapshot.quotes.iter().collect();
        ordered.sort_by(|a, b| {
            a.strike_price
                .total_cmp(&b.strike_price)
                .then_with(|| side_rank(a.side).cmp(&side_rank(b.side)))
        });

        let mut result = ChainAggregate::default();

        for quote in ordered {
            let moneyness = classify(quote.strike_price, snapshot.reference_price, quote.side, self.atm_band);

            if !quote.has_greeks() {
                result.missing_greeks += 1;
                trace!(
                    instrument = %snapshot.instrument,
                    strike = quote.strike_price,
                    side = %quote.side,
                    %moneyness,
                    "No greeks for strike"
                );
            }

            if !self.inclusion.includes(moneyness) {
                result.excluded += 1;
                trace!(
                    instrument = %snapshot.instrument,
                    strike = quote.strike_price,
                    side = %quote.side,
                    %moneyness,
                    "Strike excluded"
                );
                continue;
            }

            result.included += 1;
            let contribution = quote.contribution();
            match quote.side {
                OptionSide::Call => result.call.add(contribution),
                OptionSide::Put => result.put.add(contribution),
            }

            trace!(
                instrument = %snapshot.instrument,
                strike = quote.strike_price,
                side = %quote.side,
                %moneyness,
                vega = contribution.vega,
                theta = contribution.theta,
                "Strike included"
            );
        }

        result
    }
}

fn side_rank(side: OptionSide) -> u8 {
    match side {
        OptionSide::Call => 0,
        OptionSide::Put => 1,
    }
}
