//! Voice analysis endpoint

use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::voice::{VoiceAnalysisError, VoiceAnalysisPayload};
use crate::{ApiError, ApiResult, AppState};

/// Multipart field carrying the recording
const AUDIO_FIELD: &str = "audio";

#[derive(Debug, Serialize)]
pub struct VoiceAnalysisResponse {
    pub voice_analysis: VoiceAnalysisPayload,
}

struct AudioUpload {
    bytes: Bytes,
    content_type: Option<String>,
}

/// POST /voice_analysis
///
/// **Request:** `multipart/form-data` with a file part named `audio`; its
/// content type is forwarded to the model (default `audio/webm`).
///
/// **Response:** 200 `{"voice_analysis": {...eight keys...}}`, or 200
/// `{"voice_analysis": {"error": "<message>"}}` when the model call or its
/// output is unusable.
///
/// **Errors:**
/// - 400 Bad Request: `{"error": "No audio file provided"}` when the part is
///   absent or empty, or the body is not multipart
/// - 413 Payload Too Large: upload exceeds the configured limit
pub async fn voice_analysis(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<VoiceAnalysisResponse>> {
    let mut multipart = multipart.map_err(|_| ApiError::NoAudioProvided)?;
    let upload = read_audio_field(&mut multipart)
        .await?
        .ok_or(ApiError::NoAudioProvided)?;

    debug!(
        bytes = upload.bytes.len(),
        content_type = ?upload.content_type,
        "Audio upload received"
    );

    let result = match state
        .voice
        .analyze(&upload.bytes, upload.content_type.as_deref())
        .await
    {
        Ok(analysis) => Ok(analysis),
        Err(VoiceAnalysisError::NoAudioProvided) => return Err(ApiError::NoAudioProvided),
        Err(VoiceAnalysisError::Extraction(e)) => {
            warn!(error = %e, "Voice analysis failed");
            Err(e)
        }
    };

    Ok(Json(VoiceAnalysisResponse {
        voice_analysis: result.into(),
    }))
}

/// First part named `audio`, if any
async fn read_audio_field(multipart: &mut Multipart) -> ApiResult<Option<AudioUpload>> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(AUDIO_FIELD) {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        return Ok(Some(AudioUpload {
            bytes,
            content_type,
        }));
    }
    Ok(None)
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::BadRequest(e.body_text())
    }
}

/// Build voice analysis routes
pub fn voice_routes() -> Router<AppState> {
    Router::new().route("/voice_analysis", post(voice_analysis))
}
