//! Shared test utilities: fake providers for every pipeline seam

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use concierge_voicebot::voice::{SpeechSynthesizer, SynthesizedAudio, Transcriber};
use concierge_voicebot::{
    AssetHost, CallTurnPipeline, CallTurnPipelineBuilder, Error, HostedAudioAsset,
    ReplyGenerationError, ReplyProvider, ReplyRule, RuleReplyProvider, StagedAudio,
    SynthesisError, UploadError,
};

pub const HOURS_REPLY: &str = "We are open from 9 AM to 5 PM, Monday to Friday.";
pub const DEFAULT_REPLY: &str = "I can help with questions about our opening hours.";
pub const HOSTED_URL: &str = "https://cdn.example/a.mp3";

/// Rule provider with a single opening-hours rule
pub fn hours_rules() -> Arc<RuleReplyProvider> {
    Arc::new(RuleReplyProvider::new(
        vec![ReplyRule::new(["hours", "open"], HOURS_REPLY)],
        DEFAULT_REPLY,
    ))
}

/// Pipeline builder around the opening-hours rules
pub fn rules_pipeline() -> CallTurnPipelineBuilder {
    CallTurnPipeline::builder(hours_rules())
}

/// Reply provider that records every transcript it sees
#[derive(Default)]
pub struct RecordingReply {
    pub seen: Mutex<Vec<String>>,
    pub reply: String,
}

impl RecordingReply {
    pub fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
            reply: reply.to_string(),
        })
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReplyProvider for RecordingReply {
    async fn reply(&self, transcript: &str) -> Result<String, ReplyGenerationError> {
        self.seen.lock().unwrap().push(transcript.to_string());
        Ok(self.reply.clone())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Reply provider that always fails like a broken model API
pub struct FailingReply;

#[async_trait]
impl ReplyProvider for FailingReply {
    async fn reply(&self, _transcript: &str) -> Result<String, ReplyGenerationError> {
        Err(ReplyGenerationError::Api {
            status: 500,
            body: "model unavailable".to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Reply provider that panics
pub struct PanickingReply;

#[async_trait]
impl ReplyProvider for PanickingReply {
    async fn reply(&self, _transcript: &str) -> Result<String, ReplyGenerationError> {
        panic!("reply provider exploded");
    }

    fn name(&self) -> &'static str {
        "panicking"
    }
}

/// Synthesizer returning fixed bytes, or failing
pub struct FakeSynthesizer {
    pub outcome: Option<Vec<u8>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeSynthesizer {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            outcome: Some(vec![0xFF, 0xFB, 0x90, 0x44]),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            outcome: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, SynthesisError> {
        self.calls.lock().unwrap().push(text.to_string());
        match &self.outcome {
            Some(bytes) => Ok(SynthesizedAudio::mp3(bytes.clone())),
            None => Err(SynthesisError::Api {
                status: 401,
                body: "invalid api key".to_string(),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "fake-tts"
    }
}

/// What the fake host does on upload
pub enum HostBehavior {
    Succeed(String),
    Fail,
    Panic,
}

/// Host that records the staged file it was handed
pub struct FakeHost {
    pub behavior: HostBehavior,
    pub staged: Mutex<Vec<(PathBuf, bool, Vec<u8>)>>,
}

impl FakeHost {
    pub fn new(behavior: HostBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            staged: Mutex::new(Vec::new()),
        })
    }

    pub fn ok() -> Arc<Self> {
        Self::new(HostBehavior::Succeed(HOSTED_URL.to_string()))
    }

    /// Paths staged so far
    pub fn staged_paths(&self) -> Vec<PathBuf> {
        self.staged
            .lock()
            .unwrap()
            .iter()
            .map(|(path, _, _)| path.clone())
            .collect()
    }

    /// Whether every staged file existed while the upload ran
    pub fn all_existed_during_upload(&self) -> bool {
        self.staged.lock().unwrap().iter().all(|(_, existed, _)| *existed)
    }

    pub fn uploaded_bytes(&self) -> Vec<Vec<u8>> {
        self.staged
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, bytes)| bytes.clone())
            .collect()
    }
}

#[async_trait]
impl AssetHost for FakeHost {
    async fn upload(&self, audio: &StagedAudio) -> Result<HostedAudioAsset, UploadError> {
        let path = audio.path().to_path_buf();
        let existed = path.exists();
        let bytes = audio.read().await.unwrap_or_default();
        self.staged.lock().unwrap().push((path, existed, bytes));

        match &self.behavior {
            HostBehavior::Succeed(url) => Ok(HostedAudioAsset { url: url.clone() }),
            HostBehavior::Fail => Err(UploadError::MissingUrl("secure_url".to_string())),
            HostBehavior::Panic => panic!("host exploded mid-upload"),
        }
    }

    fn name(&self) -> &'static str {
        "fake-host"
    }
}

/// Transcriber returning a fixed transcript, or failing
pub struct FakeTranscriber {
    pub transcript: Option<String>,
    pub seen_mime: Mutex<Vec<String>>,
}

impl FakeTranscriber {
    pub fn ok(transcript: &str) -> Arc<Self> {
        Arc::new(Self {
            transcript: Some(transcript.to_string()),
            seen_mime: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            transcript: None,
            seen_mime: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(
        &self,
        _audio: &[u8],
        mime_type: &str,
    ) -> concierge_voicebot::Result<String> {
        self.seen_mime.lock().unwrap().push(mime_type.to_string());
        self.transcript
            .clone()
            .ok_or_else(|| Error::Stt("Whisper API error (500): boom".to_string()))
    }

    fn name(&self) -> &'static str {
        "fake-stt"
    }
}
