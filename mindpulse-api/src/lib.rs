//! mindpulse-api library
//!
//! HTTP service scoring mental fitness from six survey answers and
//! describing voice quality from an uploaded recording.

use axum::{extract::DefaultBodyLimit, Router};
use chrono::{DateTime, Utc};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod prediction;
pub mod voice;

pub use error::{ApiError, ApiResult};

use prediction::PredictionService;
use voice::VoiceAnalysisService;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub prediction: PredictionService,
    pub voice: VoiceAnalysisService,
    /// Server start time, reported by /health
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(prediction: PredictionService, voice: VoiceAnalysisService) -> Self {
        Self {
            prediction,
            voice,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
///
/// `max_upload_bytes` caps every request body, multipart uploads included.
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .merge(api::predict_routes())
        .merge(api::voice_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
