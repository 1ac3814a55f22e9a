//! Concierge Voicebot - telephony voice-bot gateway
//!
//! Answers inbound calls turn by turn:
//! - The telephony platform recognizes the caller's speech
//! - A reply provider (keyword rules or a chat model) produces reply text
//! - A synthesizer turns the reply into mp3 audio
//! - An asset host publishes the audio behind a URL
//! - The call is answered with TwiML that plays the audio and listens again
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Telephony platform                  │
//! │        POST /voice   │   POST /gather (speech)      │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 CallTurnPipeline                    │
//! │   ReplyProvider │ SpeechSynthesizer │ AssetHost     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 External services                   │
//! │   OpenAI  │  ElevenLabs  │  Cloudinary  │  file.io  │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod hosting;
pub mod pipeline;
pub mod reply;
pub mod twiml;
pub mod voice;

pub use config::Config;
pub use error::{Error, InputError, ReplyGenerationError, Result, SynthesisError, UploadError};
pub use hosting::{AssetHost, HostedAudioAsset, StagedAudio};
pub use pipeline::{
    AskResponse, CallTurnPipeline, CallTurnPipelineBuilder, CallTurnRequest, LoopPolicy,
    MarkupConfig, Prompts,
};
pub use reply::{ReplyProvider, ReplyRule, RuleReplyProvider};
pub use twiml::{GatherSpec, TurnResponse, Verb};
pub use voice::{SpeechSynthesizer, SynthesizedAudio, Transcriber};
