//! Speech-to-text (STT) for uploaded recordings

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

/// Response from OpenAI Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Transcribes a recorded utterance
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe audio to text
    ///
    /// # Errors
    ///
    /// Returns error if transcription fails
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Transcribes speech with OpenAI Whisper
pub struct WhisperTranscriber {
    client: Client,
    api_key: SecretString,
    model: String,
    language: Option<String>,
    base_url: String,
}

impl WhisperTranscriber {
    /// Create a new Whisper transcriber
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: SecretString, model: String, language: Option<String>) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for Whisper".to_string(),
            ));
        }

        Ok(Self {
            client: Client::new(),
            api_key,
            model,
            language,
            base_url: "https://api.openai.com/v1".to_string(),
        })
    }

    /// Use a preconfigured HTTP client
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Override the API base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Get file extension for MIME type
    fn extension_for_mime(mime_type: &str) -> &'static str {
        match mime_type {
            "audio/mpeg" | "audio/mp3" => "mp3",
            "audio/mp4" | "audio/m4a" => "m4a",
            "audio/wav" | "audio/x-wav" => "wav",
            "audio/ogg" => "ogg",
            "audio/flac" => "flac",
            _ => "webm",
        }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), mime_type, "starting Whisper transcription");

        let filename = format!("recording.{}", Self::extension_for_mime(mime_type));
        let mut form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name(filename)
                    .mime_str(mime_type)
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        if let Some(ref lang) = self.language {
            form = form.text("language", lang.clone());
        }

        let url = format!("{}/audio/transcriptions", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                e
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            e
        })?;

        let transcript = result.text.trim().to_string();
        tracing::info!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }

    fn name(&self) -> &'static str {
        "whisper"
    }
}

/// Whisper takes ISO 639-1 codes; strip the region from a locale
#[must_use]
pub fn language_hint(locale: &str) -> Option<String> {
    let lang = locale.split(['-', '_']).next()?.trim().to_lowercase();
    (lang.len() == 2).then_some(lang)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_for_mime() {
        assert_eq!(WhisperTranscriber::extension_for_mime("audio/mpeg"), "mp3");
        assert_eq!(WhisperTranscriber::extension_for_mime("audio/wav"), "wav");
        assert_eq!(WhisperTranscriber::extension_for_mime("audio/webm"), "webm");
        assert_eq!(WhisperTranscriber::extension_for_mime("application/octet-stream"), "webm");
    }

    #[test]
    fn test_language_hint() {
        assert_eq!(language_hint("nl-NL").as_deref(), Some("nl"));
        assert_eq!(language_hint("en_US").as_deref(), Some("en"));
        assert_eq!(language_hint("de").as_deref(), Some("de"));
        assert_eq!(language_hint("").as_deref(), None);
    }
}
