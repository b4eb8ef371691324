use greeks_drift::api_server_axum::{AppState, router};
use greeks_drift::drift::{DriftEngine, InstrumentRegistry, TriggerPolicy};
use greeks_drift::models::{ChainSnapshot, InstrumentKey, OptionSide, StrikeQuote};
use greeks_drift::{Clock, ManualClock};

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn setup() -> (axum::Router, Arc<InstrumentRegistry>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 10, 7, 4, 0, 0).unwrap()));
        let registry = Arc::new(InstrumentRegistry::new(TriggerPolicy::EarliestAvailable));
        let app = router(AppState::new(registry.clone(), clock.clone()));
        (app, registry, clock)
    }

    fn feed(registry: &InstrumentRegistry, clock: &ManualClock, key: InstrumentKey, call_vega: f64) {
        let snapshot = ChainSnapshot {
            instrument: key,
            reference_price: 24000.0,
            quotes: vec![
                StrikeQuote::new(24000.0, OptionSide::Call, call_vega, -5.0),
                StrikeQuote::new(24000.0, OptionSide::Put, 9.0, -4.0),
            ],
            observed_at: clock.now(),
        };
        registry.apply(&DriftEngine::default(), &snapshot).unwrap();
    }

    async fn call(app: axum::Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _, _) = setup();
        let (status, body) = call(app, "GET", "/api/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "ok");
        assert_eq!(body["data"]["instruments"], 0);
        assert_eq!(body["data"]["clock"], "ManualClock");
    }

    #[tokio::test]
    async fn test_drift_for_one_instrument() {
        let (app, registry, clock) = setup();
        let nifty: InstrumentKey = "256265:2024-10-10".parse().unwrap();

        feed(&registry, &clock, nifty, 10.0);
        clock.advance(Duration::seconds(30));
        feed(&registry, &clock, nifty, 12.5);

        let (status, body) = call(app, "GET", "/api/drift/256265/2024-10-10").await;
        assert_eq!(status, StatusCode::OK);

        let data = &body["data"];
        assert_eq!(data["tracker"]["state"], "CAPTURED");
        assert_eq!(data["last_result"]["call_vega_delta"], 2.5);
        assert_eq!(data["last_result"]["put_vega_delta"], 0.0);
        assert_eq!(data["snapshots_processed"], 2);
    }

    #[tokio::test]
    async fn test_unknown_and_bad_instrument() {
        let (app, _, _) = setup();

        let (status, body) = call(app.clone(), "GET", "/api/drift/256265/2024-10-10").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("256265@2024-10-10"));

        let (status, _) = call(app, "GET", "/api/drift/256265/10-Oct-2024").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_and_reset() {
        let (app, registry, clock) = setup();
        let nifty: InstrumentKey = "256265:2024-10-10".parse().unwrap();
        let bank: InstrumentKey = "260105:2024-10-09".parse().unwrap();
        feed(&registry, &clock, nifty, 10.0);
        feed(&registry, &clock, bank, 20.0);

        let (_, body) = call(app.clone(), "GET", "/api/drift").await;
        let list = body["data"].as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["instrument"]["underlying_token"], 256265);

        let (status, body) = call(app.clone(), "POST", "/api/reset").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["instruments_reset"], 2);

        let (_, body) = call(app, "GET", "/api/drift/260105/2024-10-09").await;
        assert_eq!(body["data"]["tracker"]["state"], "AWAITING_TRIGGER");
        assert!(body["data"]["last_result"].is_null());
        assert!(body["data"]["last_reset_at"].is_string());
    }
}
