use crate::models::OptionSide;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default half-width of the ATM band, in price units
pub const DEFAULT_ATM_BAND: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Moneyness {
    #[serde(rename = "ATM")]
    AtTheMoney,
    #[serde(rename = "OTM")]
    OutOfTheMoney,
    #[serde(rename = "ITM")]
    InTheMoney,
}

impl fmt::Display for Moneyness {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Moneyness::AtTheMoney => write!(f, "ATM"),
            Moneyness::OutOfTheMoney => write!(f, "OTM"),
            Moneyness::InTheMoney => write!(f, "ITM"),
        }
    }
}

/// Classify a strike against the reference price.
///
/// Within `atm_band` (inclusive) of the reference is ATM. Outside the band a
/// call above the reference is OTM and below is ITM; puts are the mirror.
pub fn classify(strike_price: f64, reference_price: f64, side: OptionSide, atm_band: f64) -> Moneyness {
    if (strike_price - reference_price).abs() <= atm_band {
        return Moneyness::AtTheMoney;
    }

    match side {
        OptionSide::Call => {
            if strike_price > reference_price {
                Moneyness::OutOfTheMoney
            } else {
                Moneyness::InTheMoney
            }
        }
        OptionSide::Put => {
            if strike_price < reference_price {
                Moneyness::OutOfTheMoney
            } else {
                Moneyness::InTheMoney
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_is_inclusive() {
        assert_eq!(classify(150.0, 100.0, OptionSide::Call, 50.0), Moneyness::AtTheMoney);
        assert_eq!(classify(50.0, 100.0, OptionSide::Call, 50.0), Moneyness::AtTheMoney);
        assert_eq!(classify(150.0, 100.0, OptionSide::Put, 50.0), Moneyness::AtTheMoney);
        assert_eq!(classify(100.0, 100.0, OptionSide::Put, 50.0), Moneyness::AtTheMoney);
    }

    #[test]
    fn test_call_outside_band() {
        assert_eq!(classify(220.0, 100.0, OptionSide::Call, 50.0), Moneyness::OutOfTheMoney);
        assert_eq!(classify(40.0, 100.0, OptionSide::Call, 50.0), Moneyness::InTheMoney);
    }

    #[test]
    fn test_put_outside_band() {
        assert_eq!(classify(40.0, 100.0, OptionSide::Put, 50.0), Moneyness::OutOfTheMoney);
        assert_eq!(classify(220.0, 100.0, OptionSide::Put, 50.0), Moneyness::InTheMoney);
    }

    #[test]
    fn test_zero_band() {
        assert_eq!(classify(24000.0, 24000.0, OptionSide::Call, 0.0), Moneyness::AtTheMoney);
        assert_eq!(classify(24050.0, 24000.0, OptionSide::Call, 0.0), Moneyness::OutOfTheMoney);
        assert_eq!(classify(24050.0, 24000.0, OptionSide::Put, 0.0), Moneyness::InTheMoney);
    }

    #[test]
    fn test_total_over_a_strike_ladder() {
        // Every strike gets exactly one class and call/put mirror outside the band
        let reference = 24012.5;
        for i in 0..200 {
            let strike = 23000.0 + (i as f64) * 10.0;
            let call = classify(strike, reference, OptionSide::Call, 50.0);
            let put = classify(strike, reference, OptionSide::Put, 50.0);

            if (strike - reference).abs() <= 50.0 {
                assert_eq!(call, Moneyness::AtTheMoney);
                assert_eq!(put, Moneyness::AtTheMoney);
            } else {
                assert_ne!(call, Moneyness::AtTheMoney);
                assert_ne!(call, put);
            }
        }
    }
}
