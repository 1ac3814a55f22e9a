//! Recording endpoint: upload speech, get a reply as JSON

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Serialize;

use super::ApiState;
use crate::Error;
use crate::pipeline::AskResponse;

/// Uploads default to the browser recorder's format
const DEFAULT_AUDIO_MIME: &str = "audio/webm";

/// Build the recording router (mounted under `/api`)
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/ask", post(ask))
        .with_state(state)
}

/// Transcribe an uploaded recording and answer it
///
/// Reads the `file` field, or the first non-empty field when `file` is absent.
async fn ask(
    State(state): State<Arc<ApiState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AskResponse>, AskError> {
    if !state.pipeline.has_transcriber() {
        return Err(AskError::NotConfigured(
            "speech recognition not configured".to_string(),
        ));
    }

    let mut multipart = multipart.map_err(|e| AskError::BadRequest(e.body_text()))?;
    let (audio, mime_type) = read_audio(&mut multipart)
        .await?
        .ok_or_else(|| AskError::BadRequest("missing audio file".to_string()))?;

    tracing::info!(bytes = audio.len(), mime = %mime_type, "received recording");

    let response = state
        .pipeline
        .handle_recording(&audio, &mime_type)
        .await
        .map_err(|e| match e {
            Error::Config(msg) => AskError::NotConfigured(msg),
            other => AskError::TranscriptionFailed(other.to_string()),
        })?;

    Ok(Json(response))
}

async fn read_audio(multipart: &mut Multipart) -> Result<Option<(Bytes, String)>, AskError> {
    let mut candidate = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AskError::BadRequest(e.body_text()))?
    {
        let is_file = field.name() == Some("file");
        let mime_type = field
            .content_type()
            .filter(|ct| !ct.is_empty() && *ct != "application/octet-stream")
            .unwrap_or(DEFAULT_AUDIO_MIME)
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AskError::BadRequest(e.body_text()))?;

        if data.is_empty() {
            continue;
        }
        if is_file {
            return Ok(Some((data, mime_type)));
        }
        if candidate.is_none() {
            candidate = Some((data, mime_type));
        }
    }

    Ok(candidate)
}

/// Recording API errors
#[derive(Debug)]
pub enum AskError {
    NotConfigured(String),
    BadRequest(String),
    TranscriptionFailed(String),
}

impl IntoResponse for AskError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = match self {
            Self::NotConfigured(msg) => (StatusCode::SERVICE_UNAVAILABLE, "not_configured", msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::TranscriptionFailed(msg) => {
                (StatusCode::BAD_GATEWAY, "transcription_failed", msg)
            }
        };

        if status.is_server_error() {
            tracing::warn!(code, message = %message, "recording request failed");
        }

        (status, Json(ErrorResponse { error: ErrorBody { code, message } })).into_response()
    }
}
