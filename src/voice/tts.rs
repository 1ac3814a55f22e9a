//! Text-to-speech (TTS) synthesis

use std::fmt::Display;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::SynthesisError;
use crate::{Error, Result};

/// MIME type of every synthesized payload
pub const AUDIO_MPEG: &str = "audio/mpeg";

/// Audio produced for one reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    /// Encoded audio (mp3)
    pub bytes: Vec<u8>,
    /// MIME type of `bytes`
    pub content_type: &'static str,
}

impl SynthesizedAudio {
    /// Wrap mp3 bytes
    #[must_use]
    pub const fn mp3(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_type: AUDIO_MPEG,
        }
    }
}

/// Converts reply text into playable audio
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize text to speech
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, non-success status, or empty audio
    async fn synthesize(&self, text: &str) -> std::result::Result<SynthesizedAudio, SynthesisError>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Accumulate a chunked audio stream into one buffer
///
/// # Errors
///
/// Returns error if any chunk fails or the stream yields no bytes
pub async fn collect_audio<S, B, E>(stream: S) -> std::result::Result<Vec<u8>, SynthesisError>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut stream = std::pin::pin!(stream);
    let mut audio = Vec::new();
    let mut chunks = 0_usize;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| SynthesisError::Stream(e.to_string()))?;
        audio.extend_from_slice(chunk.as_ref());
        chunks += 1;
    }

    tracing::debug!(chunks, audio_bytes = audio.len(), "audio stream complete");

    if audio.is_empty() {
        return Err(SynthesisError::EmptyAudio);
    }
    Ok(audio)
}

/// ElevenLabs voice tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// Voice stability (0.0 to 1.0)
    pub stability: f32,
    /// Similarity/fidelity weight (0.0 to 1.0)
    pub similarity_boost: f32,
    /// Style exaggeration (0.0 to 1.0)
    pub style: f32,
    /// Speaker boost
    pub use_speaker_boost: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
            style: 0.3,
            use_speaker_boost: true,
        }
    }
}

/// ElevenLabs synthesis configuration
#[derive(Debug, Clone)]
pub struct ElevenLabsConfig {
    /// Voice identity
    pub voice_id: String,
    /// Synthesis model (language/model variant)
    pub model_id: String,
    /// Voice tuning
    pub voice_settings: VoiceSettings,
    /// Output encoding, e.g. `mp3_44100_128`
    pub output_format: String,
    /// API base URL
    pub base_url: String,
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            voice_id: "YUdpWWny7k5yb4QCeweX".to_string(),
            model_id: "eleven_multilingual_v2".to_string(),
            voice_settings: VoiceSettings::default(),
            output_format: "mp3_44100_128".to_string(),
            base_url: "https://api.elevenlabs.io/v1".to_string(),
        }
    }
}

/// Streams speech from ElevenLabs
pub struct ElevenLabsSynthesizer {
    client: Client,
    api_key: SecretString,
    config: ElevenLabsConfig,
}

impl ElevenLabsSynthesizer {
    /// Create a new ElevenLabs synthesizer
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: SecretString, config: ElevenLabsConfig) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "ElevenLabs API key required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client: Client::new(),
            api_key,
            config,
        })
    }

    /// Use a preconfigured HTTP client
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
    ) -> std::result::Result<SynthesizedAudio, SynthesisError> {
        #[derive(Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
            voice_settings: VoiceSettings,
        }

        let url = format!(
            "{}/text-to-speech/{}/stream",
            self.config.base_url.trim_end_matches('/'),
            self.config.voice_id
        );

        let request = ElevenLabsRequest {
            text,
            model_id: &self.config.model_id,
            voice_settings: self.config.voice_settings,
        };

        tracing::debug!(
            voice_id = %self.config.voice_id,
            model_id = %self.config.model_id,
            chars = text.len(),
            "starting ElevenLabs synthesis"
        );

        let response = self
            .client
            .post(&url)
            .query(&[("output_format", self.config.output_format.as_str())])
            .header("xi-api-key", self.api_key.expose_secret())
            .header("Accept", AUDIO_MPEG)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let audio = collect_audio(response.bytes_stream()).await?;
        Ok(SynthesizedAudio::mp3(audio))
    }

    fn name(&self) -> &'static str {
        "elevenlabs"
    }
}

/// OpenAI speech configuration
#[derive(Debug, Clone)]
pub struct OpenAiSpeechConfig {
    /// Model (e.g. "tts-1")
    pub model: String,
    /// Voice (e.g. "alloy")
    pub voice: String,
    /// Speed multiplier (0.25 to 4.0)
    pub speed: f32,
    /// API base URL
    pub base_url: String,
}

impl Default for OpenAiSpeechConfig {
    fn default() -> Self {
        Self {
            model: "tts-1".to_string(),
            voice: "alloy".to_string(),
            speed: 1.0,
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

/// Synthesizes speech with OpenAI, reading the whole payload at once
pub struct OpenAiSynthesizer {
    client: Client,
    api_key: SecretString,
    config: OpenAiSpeechConfig,
}

impl OpenAiSynthesizer {
    /// Create a new OpenAI synthesizer
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: SecretString, config: OpenAiSpeechConfig) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: Client::new(),
            api_key,
            config,
        })
    }

    /// Use a preconfigured HTTP client
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
    ) -> std::result::Result<SynthesizedAudio, SynthesisError> {
        #[derive(Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
            response_format: &'static str,
        }

        let request = TtsRequest {
            model: &self.config.model,
            input: text,
            voice: &self.config.voice,
            speed: self.config.speed,
            response_format: "mp3",
        };

        let url = format!("{}/audio/speech", self.config.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(SynthesisError::EmptyAudio);
        }
        Ok(SynthesizedAudio::mp3(audio.to_vec()))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
