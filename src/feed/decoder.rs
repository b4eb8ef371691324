use crate::error::{DriftError, Result};
use crate::models::{ChainSnapshot, InstrumentKey, OptionSide, StrikeQuote};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};

/// One frame off the wire, stamped on receipt
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub bytes: Vec<u8>,
    pub received_at: DateTime<Utc>,
}

impl RawFrame {
    pub fn new(bytes: impl Into<Vec<u8>>, received_at: DateTime<Utc>) -> Self {
        Self {
            bytes: bytes.into(),
            received_at,
        }
    }
}

// Reference price keys, most specific first. The relay usually only sends
// atm_strike, which stands in for spot.
const REFERENCE_KEYS: [&str; 3] = ["spot_price", "underlying_price", "atm_strike"];

/// Decode a frame into one snapshot per (token, expiry) entry.
///
/// The outer error means the whole frame is unusable. Inner errors are
/// per-entry: one malformed expiry does not drop its siblings.
pub fn decode_frame(bytes: &[u8], observed_at: DateTime<Utc>) -> Result<Vec<Result<ChainSnapshot>>> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| DriftError::DecodeFailure(format!("Frame is not JSON: {}", e)))?;

    let data = value
        .pointer("/payload/data")
        .and_then(Value::as_object)
        .ok_or_else(|| DriftError::DecodeFailure("Frame has no payload.data object".to_string()))?;

    let mut snapshots = Vec::new();
    for (token, by_expiry) in data {
        let Some(by_expiry) = by_expiry.as_object() else {
            snapshots.push(Err(DriftError::malformed(token, "expected an expiry map")));
            continue;
        };

        for (expiry, entry) in by_expiry {
            snapshots.push(decode_entry(token, expiry, entry, observed_at));
        }
    }

    Ok(snapshots)
}

fn decode_entry(token: &str, expiry: &str, entry: &Value, observed_at: DateTime<Utc>) -> Result<ChainSnapshot> {
    let label = format!("{}@{}", token, expiry);

    let underlying_token = token
        .parse::<u64>()
        .map_err(|_| DriftError::malformed(&label, "underlying token is not an integer"))?;
    let expiry = NaiveDate::parse_from_str(expiry, "%Y-%m-%d")
        .map_err(|_| DriftError::malformed(&label, "expiry is not YYYY-MM-DD"))?;
    let instrument = InstrumentKey::new(underlying_token, expiry);

    let chain = entry
        .get("chain")
        .and_then(Value::as_object)
        .ok_or_else(|| DriftError::malformed(instrument, "missing chain"))?;

    let reference_price = REFERENCE_KEYS
        .iter()
        .find_map(|key| number_field(entry, key))
        .ok_or_else(|| DriftError::malformed(instrument, "missing reference price"))?;

    let quotes = decode_chain(instrument, chain)?;

    Ok(ChainSnapshot {
        instrument,
        reference_price,
        quotes,
        observed_at,
    })
}

/// Two quotes per strike (call then put), ascending strike
fn decode_chain(instrument: InstrumentKey, chain: &Map<String, Value>) -> Result<Vec<StrikeQuote>> {
    let mut quotes = Vec::with_capacity(chain.len() * 2);

    for (strike, record) in chain {
        let strike_price = strike
            .parse::<f64>()
            .ok()
            .filter(|s| s.is_finite())
            .ok_or_else(|| DriftError::malformed(instrument, format!("strike '{}' is not a number", strike)))?;

        for side in [OptionSide::Call, OptionSide::Put] {
            let greeks = side_greeks(record, side);
            quotes.push(StrikeQuote {
                strike_price,
                side,
                vega: greeks.and_then(|g| number_field(g, "vega")),
                theta: greeks.and_then(|g| number_field(g, "theta")),
            });
        }
    }

    quotes.sort_by(|a, b| a.strike_price.total_cmp(&b.strike_price));
    Ok(quotes)
}

/// `CE.greeks` / `PE.greeks` when present, else the strike-level `greeks`
fn side_greeks(record: &Value, side: OptionSide) -> Option<&Value> {
    let side_key = side.to_string();
    record
        .get(side_key.as_str())
        .and_then(|s| s.get("greeks"))
        .filter(|g| g.is_object())
        .or_else(|| record.get("greeks").filter(|g| g.is_object()))
}

/// Numbers or numeric strings; anything else is absent
fn number_field(value: &Value, key: &str) -> Option<f64> {
    let number = match value.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 7, 4, 0, 0).unwrap()
    }

    #[test]
    fn test_number_field_accepts_strings() {
        let v = json!({"a": 1.5, "b": "2.25", "c": "n/a", "d": null});
        assert_eq!(number_field(&v, "a"), Some(1.5));
        assert_eq!(number_field(&v, "b"), Some(2.25));
        assert_eq!(number_field(&v, "c"), None);
        assert_eq!(number_field(&v, "d"), None);
        assert_eq!(number_field(&v, "e"), None);
    }

    #[test]
    fn test_side_greeks_prefer_side_record() {
        let record = json!({
            "greeks": {"vega": 1.0, "theta": -1.0},
            "CE": {"greeks": {"vega": 2.0, "theta": -2.0}},
            "PE": {"last_price": 10.0}
        });

        let call = side_greeks(&record, OptionSide::Call).unwrap();
        let put = side_greeks(&record, OptionSide::Put).unwrap();
        assert_eq!(number_field(call, "vega"), Some(2.0));
        assert_eq!(number_field(put, "vega"), Some(1.0));
    }

    #[test]
    fn test_rejects_non_json() {
        assert!(matches!(
            decode_frame(b"\x1f\x8b\x08binary", at()),
            Err(DriftError::DecodeFailure(_))
        ));
        assert!(matches!(
            decode_frame(br#"{"payload": {}}"#, at()),
            Err(DriftError::DecodeFailure(_))
        ));
    }

    #[test]
    fn test_reference_prefers_spot() {
        let frame = json!({"payload": {"data": {"256265": {"2024-10-10": {
            "atm_strike": 25000,
            "spot_price": 24987.4,
            "chain": {"25000": {"greeks": {"vega": 1, "theta": -1}}}
        }}}}});

        let snapshots = decode_frame(frame.to_string().as_bytes(), at()).unwrap();
        let snap = snapshots[0].as_ref().unwrap();
        assert_eq!(snap.reference_price, 24987.4);
    }
}
