use crate::clock::Clock;
use crate::drift::{InstrumentRegistry, InstrumentView};
use crate::models::InstrumentKey;
use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tracing::info;

// -----------------------------------------------
// API RESPONSE MODELS
// -----------------------------------------------

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub processing_time_ms: Option<u64>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T, start_time: Instant) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            processing_time_ms: Some(start_time.elapsed().as_millis() as u64),
        }
    }

    fn err(error: impl Into<String>, start_time: Instant) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            processing_time_ms: Some(start_time.elapsed().as_millis() as u64),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub instruments: usize,
    pub now: DateTime<Utc>,
    pub clock: String,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub instruments_reset: usize,
    pub reset_at: DateTime<Utc>,
}

// -----------------------------------------------
// APPLICATION STATE
// -----------------------------------------------

#[derive(Clone)]
pub struct AppState {
    registry: Arc<InstrumentRegistry>,
    clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(registry: Arc<InstrumentRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self { registry, clock }
    }
}

// -----------------------------------------------
// API HANDLERS
// -----------------------------------------------

/// GET /api/health
async fn get_health(State(app_state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let start_time = Instant::now();
    Json(ApiResponse::ok(
        HealthResponse {
            status: "ok",
            instruments: app_state.registry.len(),
            now: app_state.clock.now(),
            clock: app_state.clock.name().to_string(),
        },
        start_time,
    ))
}

/// GET /api/drift - every known instrument
async fn get_all_drift(State(app_state): State<AppState>) -> Json<ApiResponse<Vec<InstrumentView>>> {
    let start_time = Instant::now();
    Json(ApiResponse::ok(app_state.registry.views(), start_time))
}

/// GET /api/drift/{token}/{expiry} - one instrument, expiry as YYYY-MM-DD
async fn get_instrument_drift(
    Path((token, expiry)): Path<(u64, String)>,
    State(app_state): State<AppState>,
) -> (StatusCode, Json<ApiResponse<InstrumentView>>) {
    let start_time = Instant::now();

    let expiry = match NaiveDate::parse_from_str(&expiry, "%Y-%m-%d") {
        Ok(date) => date,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::err(
                    format!("Invalid expiry '{}', expected YYYY-MM-DD", expiry),
                    start_time,
                )),
            );
        }
    };

    let key = InstrumentKey::new(token, expiry);
    match app_state.registry.view(&key) {
        Some(view) => (StatusCode::OK, Json(ApiResponse::ok(view, start_time))),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::err(format!("Unknown instrument {}", key), start_time)),
        ),
    }
}

/// POST /api/reset - manual day rollover
async fn reset_all(State(app_state): State<AppState>) -> Json<ApiResponse<ResetResponse>> {
    let start_time = Instant::now();
    let reset_at = app_state.clock.now();
    let instruments_reset = app_state.registry.reset_all(reset_at);

    Json(ApiResponse::ok(
        ResetResponse {
            instruments_reset,
            reset_at,
        },
        start_time,
    ))
}

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(get_health))
        .route("/api/drift", get(get_all_drift))
        .route("/api/drift/{token}/{expiry}", get(get_instrument_drift))
        .route("/api/reset", post(reset_all))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

pub async fn start_server(port: u16, registry: Arc<InstrumentRegistry>, clock: Arc<dyn Clock>) -> anyhow::Result<()> {
    let app = router(AppState::new(registry, clock));

    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(%addr, "Drift API server listening");
    info!("  GET  /api/health");
    info!("  GET  /api/drift");
    info!("  GET  /api/drift/{{token}}/{{expiry}}");
    info!("  POST /api/reset");

    axum::serve(listener, app).await?;
    Ok(())
}
