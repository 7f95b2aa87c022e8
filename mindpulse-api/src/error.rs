//! Error types for mindpulse-api

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::prediction::PredictionError;

/// Message returned when the upload has no usable `audio` part
pub const NO_AUDIO_MESSAGE: &str = "No audio file provided";

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upload exceeds the configured body limit (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Survey answers rejected or classifier unusable
    #[error(transparent)]
    Prediction(#[from] PredictionError),

    /// No `audio` part, or an empty one (400, flat body)
    #[error("{}", NO_AUDIO_MESSAGE)]
    NoAudioProvided,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, field) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg, None)
            }
            ApiError::Prediction(err) => {
                let field = err.field().map(str::to_string);
                let (status, code) = match err {
                    PredictionError::MissingField { .. } => {
                        (StatusCode::BAD_REQUEST, "MISSING_FIELD")
                    }
                    PredictionError::UnexpectedField { .. } => {
                        (StatusCode::BAD_REQUEST, "UNEXPECTED_FIELD")
                    }
                    PredictionError::UnknownCategory { .. } => {
                        (StatusCode::BAD_REQUEST, "UNKNOWN_CATEGORY")
                    }
                    PredictionError::ModelUnavailable(_) => {
                        (StatusCode::SERVICE_UNAVAILABLE, "MODEL_UNAVAILABLE")
                    }
                };
                (status, code, err.to_string(), field)
            }
            ApiError::NoAudioProvided => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": NO_AUDIO_MESSAGE })),
                )
                    .into_response();
            }
        };

        let mut error = json!({
            "code": error_code,
            "message": message,
        });
        if let Some(field) = field {
            error["field"] = json!(field);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ApiError::Prediction(PredictionError::MissingField {
                    field: "gender".into(),
                }),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Prediction(PredictionError::ModelUnavailable("gone".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (ApiError::NoAudioProvided, StatusCode::BAD_REQUEST),
            (
                ApiError::PayloadTooLarge("too big".into()),
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
