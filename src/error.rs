//! Error types for the concierge voicebot
//!
//! [`Error`] covers startup, configuration and the transcription path. The
//! per-step errors below never escape a call turn: each is caught at the
//! boundary that produced it and converted into the next fallback tier.

use thiserror::Error;

/// Result type alias for concierge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur outside the call-turn fallback chain
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// IO error, including server bind failures
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Language-model call failed or returned unusable data
#[derive(Debug, Error)]
pub enum ReplyGenerationError {
    #[error("reply request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("reply API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed reply response: {0}")]
    Malformed(String),

    #[error("reply provider returned no text")]
    Empty,
}

/// Voice provider call failed or returned no usable audio
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("synthesis request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("synthesis API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("synthesis stream failed: {0}")]
    Stream(String),

    #[error("synthesis returned an empty audio stream")]
    EmptyAudio,
}

/// Asset host rejected the upload or omitted the expected URL
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to stage audio: {0}")]
    Staging(#[from] std::io::Error),

    #[error("upload request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upload API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("upload response is missing the `{0}` field")]
    MissingUrl(String),
}

/// Inbound webhook form could not be decoded
///
/// Treated as an empty transcript, never as a hard failure.
#[derive(Debug, Error)]
#[error("malformed webhook input: {0}")]
pub struct InputError(pub String);
