//! Telephony webhooks answering with TwiML

use std::sync::Arc;

use axum::{
    Form, Router,
    extract::{State, rejection::FormRejection},
    routing::post,
};
use serde::Deserialize;

use super::ApiState;
use crate::error::InputError;
use crate::pipeline::CallTurnRequest;
use crate::twiml::TurnResponse;

/// Build the call webhook router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/voice", post(entry).get(entry))
        .route("/gather", post(gather))
        .with_state(state)
}

/// Form fields posted by the platform after a speech gather
#[derive(Debug, Default, Deserialize)]
pub struct GatherForm {
    #[serde(rename = "SpeechResult")]
    pub speech_result: Option<String>,

    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,

    /// Kept as text so an empty value doesn't reject the whole form
    #[serde(rename = "Confidence")]
    pub confidence: Option<String>,
}

impl From<GatherForm> for CallTurnRequest {
    fn from(form: GatherForm) -> Self {
        Self {
            transcript: form.speech_result,
            call_sid: form.call_sid.filter(|sid| !sid.is_empty()),
            confidence: form.confidence.and_then(|c| c.trim().parse().ok()),
        }
    }
}

/// Answer a new call with the greeting
async fn entry(State(state): State<Arc<ApiState>>) -> TurnResponse {
    tracing::info!("incoming call");
    state.pipeline.handle_entry()
}

/// Answer one gathered speech turn
///
/// An undecodable form is handled as silence so the caller is asked to repeat.
async fn gather(
    State(state): State<Arc<ApiState>>,
    form: Result<Form<GatherForm>, FormRejection>,
) -> TurnResponse {
    let request = match form {
        Ok(Form(form)) => CallTurnRequest::from(form),
        Err(rejection) => {
            let error = InputError(rejection.body_text());
            tracing::warn!(
                step = "input",
                fallback = "empty transcript",
                error = %error,
                "could not decode gather webhook"
            );
            CallTurnRequest::default()
        }
    };

    state.pipeline.handle_turn(&request).await
}
