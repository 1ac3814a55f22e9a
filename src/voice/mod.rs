//! Voice processing module
//!
//! Speech synthesis for replies and transcription for uploaded recordings.
//! Live call audio is recognized by the telephony platform, not here.

mod stt;
mod tts;

pub use stt::{Transcriber, WhisperTranscriber, language_hint};
pub use tts::{
    AUDIO_MPEG, ElevenLabsConfig, ElevenLabsSynthesizer, OpenAiSpeechConfig, OpenAiSynthesizer,
    SpeechSynthesizer, SynthesizedAudio, VoiceSettings, collect_audio,
};
