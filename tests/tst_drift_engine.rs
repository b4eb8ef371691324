use greeks_drift::drift::{DriftEngine, ProcessOutcome, StrikeInclusion, TriggerPolicy};
use greeks_drift::models::{ChainSnapshot, InstrumentKey, OptionSide, StrikeQuote};
use greeks_drift::{BaselineTracker, DriftError};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};

    fn nifty() -> InstrumentKey {
        "256265:2024-10-10".parse().unwrap()
    }

    // 09:00 IST on 2024-10-07
    fn session_open() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 7, 3, 30, 0).unwrap()
    }

    fn ist_915() -> TriggerPolicy {
        TriggerPolicy::fixed_time(
            NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
            FixedOffset::east_opt(330 * 60).unwrap(),
        )
    }

    fn calls(reference: f64, quotes: &[(f64, f64, f64)], observed_at: DateTime<Utc>) -> ChainSnapshot {
        ChainSnapshot {
            instrument: nifty(),
            reference_price: reference,
            quotes: quotes
                .iter()
                .map(|&(strike, vega, theta)| StrikeQuote::new(strike, OptionSide::Call, vega, theta))
                .collect(),
            observed_at,
        }
    }

    #[test]
    fn test_worked_example_call_vega_drift() {
        let engine = DriftEngine::new(50.0, StrikeInclusion::NearTheMoney);
        let mut tracker = BaselineTracker::new(nifty(), TriggerPolicy::EarliestAvailable);
        let t0 = session_open();

        let first = engine
            .process(&calls(100.0, &[(80.0, 1.0, 2.0), (150.0, 3.0, 4.0), (220.0, 5.0, 6.0)], t0), &mut tracker)
            .unwrap();
        let first = first.drift().unwrap();
        assert!(first.is_zero());
        assert_eq!(first.baseline.call.vega, 9.0);
        assert_eq!(first.baseline.call.theta, 12.0);

        let second = engine
            .process(
                &calls(100.0, &[(80.0, 1.0, 2.0), (150.0, 3.0, 4.0), (220.0, 8.0, 6.0)], t0 + Duration::seconds(5)),
                &mut tracker,
            )
            .unwrap();
        let second = second.drift().unwrap();
        assert_eq!(second.call_vega_delta, 3.0);
        assert_eq!(second.call_theta_delta, 0.0);
        assert_eq!(second.put_vega_delta, 0.0);
        assert_eq!(second.as_of, t0 + Duration::seconds(5));
    }

    #[test]
    fn test_fixed_time_gate_suppresses_until_915() {
        let engine = DriftEngine::default();
        let mut tracker = BaselineTracker::new(nifty(), ist_915());
        let quotes = [(24000.0, 10.0, -5.0)];

        // 09:14:59 IST
        let early = session_open() + Duration::seconds(14 * 60 + 59);
        let outcome = engine.process(&calls(24000.0, &quotes, early), &mut tracker).unwrap();
        assert_eq!(
            outcome,
            ProcessOutcome::SuppressedNoBaseline {
                instrument: nifty(),
                as_of: early,
            }
        );
        assert!(matches!(tracker.baseline(), Err(DriftError::NotCaptured(_))));

        // 09:15:02 IST captures
        let at = session_open() + Duration::seconds(15 * 60 + 2);
        let outcome = engine.process(&calls(24000.0, &[(24000.0, 12.0, -6.0)], at), &mut tracker).unwrap();
        let drift = outcome.drift().unwrap();
        assert!(drift.is_zero());
        assert_eq!(drift.baseline.captured_at, at);

        // Later snapshot measures against the 09:15:02 values, not the pre-gate ones
        let later = at + Duration::minutes(30);
        let outcome = engine.process(&calls(24000.0, &[(24000.0, 11.0, -7.5)], later), &mut tracker).unwrap();
        let drift = outcome.drift().unwrap();
        assert_eq!(drift.call_vega_delta, -1.0);
        assert_eq!(drift.call_theta_delta, -1.5);
        assert_eq!(tracker.captures(), 1);
    }

    #[test]
    fn test_identical_snapshot_is_idempotent() {
        let engine = DriftEngine::default();
        let mut tracker = BaselineTracker::new(nifty(), TriggerPolicy::EarliestAvailable);
        let t0 = session_open();

        engine.process(&calls(24000.0, &[(24000.0, 10.0, -5.0)], t0), &mut tracker).unwrap();
        let snapshot = calls(24000.0, &[(24000.0, 14.0, -4.0)], t0 + Duration::seconds(1));

        let a = engine.process(&snapshot, &mut tracker).unwrap();
        let b = engine.process(&snapshot, &mut tracker).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.drift().unwrap().call_vega_delta, 4.0);
    }

    #[test]
    fn test_reset_recaptures_on_next_snapshot() {
        let engine = DriftEngine::default();
        let mut tracker = BaselineTracker::new(nifty(), TriggerPolicy::EarliestAvailable);
        let t0 = session_open();

        engine.process(&calls(24000.0, &[(24000.0, 10.0, -5.0)], t0), &mut tracker).unwrap();
        tracker.reset();
        assert!(!tracker.is_captured());

        let next_day = t0 + Duration::days(1);
        let outcome = engine.process(&calls(24100.0, &[(24100.0, 7.0, -3.0)], next_day), &mut tracker).unwrap();
        let drift = outcome.drift().unwrap();
        assert!(drift.is_zero());
        assert_eq!(drift.baseline.call.vega, 7.0);
        assert_eq!(drift.baseline.captured_at, next_day);
    }

    #[test]
    fn test_itm_inclusion_policy() {
        // Reference 24000, band 50: the 23800 call is ITM
        let snapshot = calls(24000.0, &[(23800.0, 4.0, -2.0), (24000.0, 10.0, -5.0)], session_open());

        let mut near = BaselineTracker::new(nifty(), TriggerPolicy::EarliestAvailable);
        let outcome = DriftEngine::new(50.0, StrikeInclusion::NearTheMoney)
            .process(&snapshot, &mut near)
            .unwrap();
        assert_eq!(outcome.drift().unwrap().current_call.vega, 10.0);

        let mut all = BaselineTracker::new(nifty(), TriggerPolicy::EarliestAvailable);
        let outcome = DriftEngine::new(50.0, StrikeInclusion::AllStrikes)
            .process(&snapshot, &mut all)
            .unwrap();
        assert_eq!(outcome.drift().unwrap().current_call.vega, 14.0);
    }

    #[test]
    fn test_malformed_snapshot_leaves_tracker_untouched() {
        let engine = DriftEngine::default();
        let mut tracker = BaselineTracker::new(nifty(), TriggerPolicy::EarliestAvailable);

        let mut bad = calls(0.0, &[(24000.0, 10.0, -5.0)], session_open());
        assert!(matches!(
            engine.process(&bad, &mut tracker),
            Err(DriftError::MalformedSnapshot { .. })
        ));

        bad.reference_price = f64::NAN;
        assert!(engine.process(&bad, &mut tracker).is_err());
        assert!(!tracker.is_captured());
    }
}
