//! Mental fitness prediction endpoint

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::prediction::ScoreResult;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub mental_fitness_score: ScoreResult,
}

/// POST /predict
///
/// **Request:** JSON object with exactly the six survey keys
/// (`gender`, `Occupation`, `Mood_Swings`, `Changes_Habits`,
/// `Work_Interest`, `Social_Weakness`), each a string.
///
/// **Response:** `{"mental_fitness_score": 0..=100}`
///
/// **Errors:**
/// - 400 Bad Request: body is not a JSON object, or a field is missing,
///   unexpected or out of vocabulary (`error.field` names it)
/// - 413 Payload Too Large: body exceeds the upload limit
/// - 503 Service Unavailable: classifier produced no usable probability
pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<PredictResponse>> {
    let Json(body) = payload.map_err(json_error)?;
    let answers = body
        .as_object()
        .ok_or_else(|| ApiError::BadRequest("Request body must be a JSON object".to_string()))?;

    let score = state.prediction.predict(answers).map_err(|e| {
        warn!(error = %e, "Prediction request rejected");
        e
    })?;

    Ok(Json(PredictResponse {
        mental_fitness_score: score,
    }))
}

fn json_error(e: JsonRejection) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::BadRequest(e.body_text())
    }
}

/// Build prediction routes
pub fn predict_routes() -> Router<AppState> {
    Router::new().route("/predict", post(predict))
}
