//! Call-turn pipeline
//!
//! Turns one inbound speech turn into one outbound markup document:
//!
//! ```text
//! transcript ─▶ ReplyProvider ─▶ SpeechSynthesizer ─▶ AssetHost ─▶ <Play> + <Gather>
//!                    │ fails            │ fails            │ fails
//!                    ▼                  ▼                  ▼
//!              apology text         <Say> + <Gather>  (text-only tier)
//! ```
//!
//! Every dependency failure degrades at its own boundary, and the whole turn
//! runs under `catch_unwind`, so `handle_turn` always returns a well-formed
//! response that keeps the conversation going.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::error::UploadError;
use crate::hosting::{AssetHost, HostedAudioAsset, StagedAudio};
use crate::reply::ReplyProvider;
use crate::twiml::{GatherSpec, TurnResponse};
use crate::voice::{SpeechSynthesizer, Transcriber};
use crate::{Error, Result};

/// Fixed phrases spoken by the bot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompts {
    /// Spoken when the call is answered
    pub greeting: String,
    /// Used when recognition produced nothing
    pub retry: String,
    /// Used when the reply provider fails
    pub apology: String,
    /// Used when the turn fails unexpectedly
    pub error: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            greeting: "Welkom bij de concierge service. Waarmee kan ik u helpen?".to_string(),
            retry: "Ik heb niets gehoord. Kunt u het opnieuw proberen?".to_string(),
            apology: "Het spijt me, ik kan uw vraag nu niet beantwoorden. Kunt u het nog eens proberen?"
                .to_string(),
            error: "Er ging iets mis aan onze kant. Probeer het alstublieft opnieuw.".to_string(),
        }
    }
}

/// How the text-only fallback continues the call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoopPolicy {
    /// Re-open the speech prompt right away
    #[default]
    Gather,
    /// Send the caller back to the greeting
    #[serde(alias = "redirect")]
    RedirectToEntry,
}

impl FromStr for LoopPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gather" => Ok(Self::Gather),
            "redirect" | "redirect-to-entry" => Ok(Self::RedirectToEntry),
            other => Err(Error::Config(format!("unknown loop policy: {other}"))),
        }
    }
}

/// Markup settings shared by every response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupConfig {
    /// Recognition and `Say` locale
    pub locale: String,
    /// Path the platform posts gathered speech to
    pub gather_path: String,
    /// Path of the greeting handler
    pub entry_path: String,
    /// Gather input mode
    pub input: String,
    /// Gather silence timeout
    pub gather_timeout_secs: u32,
    /// Platform end-of-speech detection
    pub speech_timeout: Option<String>,
    /// Built-in platform voice for `Say`
    pub say_voice: Option<String>,
    /// Fallback loop behaviour
    pub loop_policy: LoopPolicy,
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            locale: "nl-NL".to_string(),
            gather_path: "/gather".to_string(),
            entry_path: "/voice".to_string(),
            input: "speech".to_string(),
            gather_timeout_secs: 6,
            speech_timeout: None,
            say_voice: None,
            loop_policy: LoopPolicy::Gather,
        }
    }
}

impl MarkupConfig {
    fn gather_spec(&self) -> GatherSpec {
        GatherSpec {
            input: self.input.clone(),
            action: self.gather_path.clone(),
            method: "POST".to_string(),
            timeout_secs: self.gather_timeout_secs,
            language: self.locale.clone(),
            speech_timeout: self.speech_timeout.clone(),
        }
    }
}

/// One inbound speech turn
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallTurnRequest {
    /// Recognized speech; missing or empty when nothing was heard
    pub transcript: Option<String>,
    /// Telephony call identifier, for log correlation only
    pub call_sid: Option<String>,
    /// Recognizer confidence
    pub confidence: Option<f32>,
}

impl CallTurnRequest {
    /// Create a request from a transcript
    #[must_use]
    pub fn new(transcript: impl Into<String>) -> Self {
        Self {
            transcript: Some(transcript.into()),
            ..Self::default()
        }
    }

    /// Attach the call identifier
    #[must_use]
    pub fn with_call_sid(mut self, call_sid: impl Into<String>) -> Self {
        self.call_sid = Some(call_sid.into());
        self
    }

    /// Trimmed transcript, `None` when nothing usable was recognized
    #[must_use]
    pub fn speech(&self) -> Option<&str> {
        self.transcript
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Result of the JSON recording endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    pub transcript: String,
    pub reply: String,
    pub audio_url: Option<String>,
}

/// Builder for [`CallTurnPipeline`]
pub struct CallTurnPipelineBuilder {
    reply: Arc<dyn ReplyProvider>,
    reply_fallback: Option<Arc<dyn ReplyProvider>>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    host: Option<Arc<dyn AssetHost>>,
    transcriber: Option<Arc<dyn Transcriber>>,
    prompts: Prompts,
    markup: MarkupConfig,
    staging_dir: Option<PathBuf>,
}

impl CallTurnPipelineBuilder {
    /// Provider consulted when the primary reply provider fails
    #[must_use]
    pub fn reply_fallback(mut self, provider: Arc<dyn ReplyProvider>) -> Self {
        self.reply_fallback = Some(provider);
        self
    }

    /// Set the speech synthesizer
    #[must_use]
    pub fn synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Set the asset host
    #[must_use]
    pub fn host(mut self, host: Arc<dyn AssetHost>) -> Self {
        self.host = Some(host);
        self
    }

    /// Set the transcriber used for uploaded recordings
    #[must_use]
    pub fn transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    /// Set the fixed phrases
    #[must_use]
    pub fn prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Set markup settings
    #[must_use]
    pub fn markup(mut self, markup: MarkupConfig) -> Self {
        self.markup = markup;
        self
    }

    /// Stage audio in this directory instead of the system temp dir
    #[must_use]
    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    /// Build the pipeline
    #[must_use]
    pub fn build(self) -> CallTurnPipeline {
        CallTurnPipeline {
            reply: self.reply,
            reply_fallback: self.reply_fallback,
            synthesizer: self.synthesizer,
            host: self.host,
            transcriber: self.transcriber,
            prompts: self.prompts,
            markup: self.markup,
            staging_dir: self.staging_dir,
        }
    }
}

/// Stateless orchestrator for call turns, shared across concurrent calls
pub struct CallTurnPipeline {
    reply: Arc<dyn ReplyProvider>,
    reply_fallback: Option<Arc<dyn ReplyProvider>>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    host: Option<Arc<dyn AssetHost>>,
    transcriber: Option<Arc<dyn Transcriber>>,
    prompts: Prompts,
    markup: MarkupConfig,
    staging_dir: Option<PathBuf>,
}

impl CallTurnPipeline {
    /// Start building a pipeline around a reply provider
    #[must_use]
    pub fn builder(reply: Arc<dyn ReplyProvider>) -> CallTurnPipelineBuilder {
        CallTurnPipelineBuilder {
            reply,
            reply_fallback: None,
            synthesizer: None,
            host: None,
            transcriber: None,
            prompts: Prompts::default(),
            markup: MarkupConfig::default(),
            staging_dir: None,
        }
    }

    /// Greeting markup for a freshly answered call
    ///
    /// A caller who stays silent falls through the gather to the redirect
    /// and hears the greeting again.
    #[must_use]
    pub fn handle_entry(&self) -> TurnResponse {
        TurnResponse::new()
            .say(
                self.prompts.greeting.as_str(),
                Some(self.markup.locale.as_str()),
                self.markup.say_voice.as_deref(),
            )
            .gather(self.markup.gather_spec())
            .redirect(self.markup.entry_path.as_str(), "POST")
    }

    /// Answer one speech turn; never fails
    pub async fn handle_turn(&self, request: &CallTurnRequest) -> TurnResponse {
        let call_sid = request
            .call_sid
            .clone()
            .unwrap_or_else(|| format!("local-{}", uuid::Uuid::new_v4()));
        let span = tracing::info_span!("turn", call_sid = %call_sid);

        let outcome = AssertUnwindSafe(self.run_turn(request))
            .catch_unwind()
            .instrument(span)
            .await;

        outcome.unwrap_or_else(|panic| {
            tracing::error!(
                call_sid = %call_sid,
                panic = panic_message(panic.as_ref()),
                "turn failed unexpectedly, answering with generic apology"
            );
            self.say_response(&self.prompts.error)
        })
    }

    /// Transcribe an uploaded recording and run the reply steps on it
    ///
    /// # Errors
    ///
    /// Returns error if no transcriber is configured or transcription fails.
    /// Reply, synthesis, and upload failures degrade instead of erroring.
    pub async fn handle_recording(&self, audio: &[u8], mime_type: &str) -> Result<AskResponse> {
        let transcriber = self
            .transcriber
            .as_ref()
            .ok_or_else(|| Error::Config("no transcriber configured".to_string()))?;

        let transcript = transcriber.transcribe(audio, mime_type).await?;
        let request = CallTurnRequest::new(transcript.clone());
        let call_sid = format!("local-{}", uuid::Uuid::new_v4());
        let span = tracing::info_span!("turn", call_sid = %call_sid);

        let outcome = AssertUnwindSafe(self.run_recording_turn(&request))
            .catch_unwind()
            .instrument(span)
            .await;

        let (reply, audio_url) = outcome.unwrap_or_else(|panic| {
            tracing::error!(
                call_sid = %call_sid,
                panic = panic_message(panic.as_ref()),
                "recording turn failed unexpectedly, answering with generic apology"
            );
            (self.prompts.error.clone(), None)
        });

        Ok(AskResponse {
            transcript,
            reply,
            audio_url,
        })
    }

    /// Whether uploaded recordings can be transcribed
    #[must_use]
    pub fn has_transcriber(&self) -> bool {
        self.transcriber.is_some()
    }

    /// Name of the configured transcriber
    #[must_use]
    pub fn transcriber_name(&self) -> Option<&'static str> {
        self.transcriber.as_ref().map(|t| t.name())
    }

    /// Name of the configured speech synthesizer
    #[must_use]
    pub fn synthesizer_name(&self) -> Option<&'static str> {
        self.synthesizer.as_ref().map(|s| s.name())
    }

    /// Name of the configured asset host
    #[must_use]
    pub fn host_name(&self) -> Option<&'static str> {
        self.host.as_ref().map(|h| h.name())
    }

    /// Name of the primary reply provider
    #[must_use]
    pub fn reply_provider_name(&self) -> &'static str {
        self.reply.name()
    }

    async fn run_turn(&self, request: &CallTurnRequest) -> TurnResponse {
        if let Some(confidence) = request.confidence {
            tracing::debug!(confidence, "speech recognized");
        }

        let reply = self.reply_text(request).await;

        match self.voice_reply(&reply).await {
            Some(asset) => {
                tracing::info!(url = %asset.url, "playing hosted reply");
                self.play_response(&asset.url)
            }
            None => self.say_response(&reply),
        }
    }

    async fn run_recording_turn(&self, request: &CallTurnRequest) -> (String, Option<String>) {
        let reply = self.reply_text(request).await;
        let audio_url = self.voice_reply(&reply).await.map(|asset| asset.url);
        (reply, audio_url)
    }

    /// Normalize the transcript and derive the reply text
    async fn reply_text(&self, request: &CallTurnRequest) -> String {
        let Some(transcript) = request.speech() else {
            tracing::info!("no speech recognized, asking caller to repeat");
            return self.prompts.retry.clone();
        };

        tracing::debug!(transcript = %transcript, "caller said");

        match self.reply.reply(transcript).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                tracing::warn!(
                    step = "reply",
                    provider = self.reply.name(),
                    "reply provider returned blank text, falling back"
                );
                self.fallback_reply(transcript).await
            }
            Err(e) => {
                tracing::warn!(
                    step = "reply",
                    provider = self.reply.name(),
                    error = %e,
                    "reply generation failed, falling back"
                );
                self.fallback_reply(transcript).await
            }
        }
    }

    async fn fallback_reply(&self, transcript: &str) -> String {
        if let Some(fallback) = &self.reply_fallback {
            match fallback.reply(transcript).await {
                Ok(text) if !text.trim().is_empty() => {
                    tracing::info!(fallback = fallback.name(), "using fallback reply provider");
                    return text.trim().to_string();
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        step = "reply",
                        fallback = "apology",
                        provider = fallback.name(),
                        error = %e,
                        "fallback reply provider failed"
                    );
                }
            }
        }
        self.prompts.apology.clone()
    }

    /// Synthesize and host the reply; `None` means speak it as text instead
    async fn voice_reply(&self, text: &str) -> Option<HostedAudioAsset> {
        let (Some(synthesizer), Some(host)) = (&self.synthesizer, &self.host) else {
            tracing::debug!("synthesis or hosting not configured, replying with platform speech");
            return None;
        };

        let audio = match synthesizer.synthesize(text).await {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!(
                    step = "synthesis",
                    provider = synthesizer.name(),
                    fallback = "say",
                    error = %e,
                    "speech synthesis failed"
                );
                return None;
            }
        };

        let staged = match StagedAudio::stage_blocking(audio, self.staging_dir.clone()).await {
            Ok(staged) => staged,
            Err(e) => {
                let e = UploadError::from(e);
                tracing::warn!(
                    step = "upload",
                    fallback = "say",
                    error = %e,
                    "audio staging failed"
                );
                return None;
            }
        };

        match host.upload(&staged).await {
            Ok(asset) => Some(asset),
            Err(e) => {
                tracing::warn!(
                    step = "upload",
                    provider = host.name(),
                    fallback = "say",
                    error = %e,
                    "audio upload failed"
                );
                None
            }
        }
    }

    fn play_response(&self, url: &str) -> TurnResponse {
        TurnResponse::new()
            .play(url)
            .gather(self.markup.gather_spec())
    }

    fn say_response(&self, text: &str) -> TurnResponse {
        let response = TurnResponse::new().say(
            text,
            Some(self.markup.locale.as_str()),
            self.markup.say_voice.as_deref(),
        );

        match self.markup.loop_policy {
            LoopPolicy::Gather => response.gather(self.markup.gather_spec()),
            LoopPolicy::RedirectToEntry => {
                response.redirect(self.markup.entry_path.as_str(), "POST")
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
