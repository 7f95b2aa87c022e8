//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    /// Description of the loaded classifier
    pub classifier: String,
    /// Generative model used for voice analysis
    pub voice_model: String,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: i64,
}

/// GET /health
///
/// Always 200 while the process is serving; the classifier is loaded
/// before the listener binds.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "mindpulse-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        classifier: state.prediction.scorer().describe(),
        voice_model: state.voice.model_name().to_string(),
        started_at: state.startup_time,
        uptime_seconds: (Utc::now() - state.startup_time).num_seconds(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
