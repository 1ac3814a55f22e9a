//! TOML configuration file loading
//!
//! Reads `$CONCIERGE_CONFIG` or `~/.config/concierge/config.toml`. Every field
//! is optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;
use crate::pipeline::LoopPolicy;
use crate::reply::ReplyRule;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConciergeConfigFile {
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Reply generation
    #[serde(default)]
    pub reply: ReplyFileConfig,

    /// Speech synthesis and recognition
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Audio hosting
    #[serde(default)]
    pub upload: UploadFileConfig,

    /// Markup rendering
    #[serde(default)]
    pub markup: MarkupFileConfig,

    /// Fixed phrases
    #[serde(default)]
    pub prompts: PromptsFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// HTTP server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    pub port: Option<u16>,

    /// Directory of static web files
    pub static_dir: Option<String>,

    /// Outbound request timeout in seconds
    pub http_timeout_secs: Option<u64>,
}

/// Reply generation configuration
#[derive(Debug, Default, Deserialize)]
pub struct ReplyFileConfig {
    /// `rules` or `model`
    pub mode: Option<String>,

    /// Chat model identifier (e.g. "gpt-4o")
    pub model: Option<String>,

    pub max_output_tokens: Option<u32>,

    pub system_prompt: Option<String>,

    /// Use the rules when the model fails
    pub fallback_to_rules: Option<bool>,

    /// Keyword rules, checked in order
    pub rules: Option<Vec<ReplyRule>>,

    /// Reply when no rule matches
    pub default_reply: Option<String>,
}

/// Voice configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Locale for recognition and speech (e.g. "nl-NL")
    pub locale: Option<String>,

    /// `elevenlabs`, `openai` or `none`
    pub tts_provider: Option<String>,

    /// `ElevenLabs` voice or `OpenAI` voice name
    pub voice_id: Option<String>,

    pub tts_model: Option<String>,

    pub stability: Option<f32>,
    pub similarity_boost: Option<f32>,
    pub style: Option<f32>,
    pub speaker_boost: Option<bool>,

    /// Platform voice for text-only replies (e.g. "Polly.Lotte")
    pub say_voice: Option<String>,

    /// Transcription model
    pub stt_model: Option<String>,
}

/// Audio hosting configuration
#[derive(Debug, Default, Deserialize)]
pub struct UploadFileConfig {
    /// `cloudinary`, `file-upload` or `none`
    pub provider: Option<String>,

    pub cloud_name: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub upload_preset: Option<String>,
    pub folder: Option<String>,

    /// File-upload service endpoint
    pub endpoint: Option<String>,

    /// JSON field holding the hosted URL
    pub url_field: Option<String>,

    /// Retention hint, e.g. "1d"
    pub expires: Option<String>,
}

/// Markup configuration
#[derive(Debug, Default, Deserialize)]
pub struct MarkupFileConfig {
    pub gather_timeout_secs: Option<u32>,
    pub speech_timeout: Option<String>,
    pub loop_policy: Option<LoopPolicy>,
}

/// Fixed phrases
#[derive(Debug, Default, Deserialize)]
pub struct PromptsFileConfig {
    pub greeting: Option<String>,
    pub retry: Option<String>,
    pub apology: Option<String>,
    pub error: Option<String>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub elevenlabs: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ConciergeConfigFile::default()` if the file doesn't exist or can't be parsed.
#[must_use]
pub fn load_config_file() -> ConciergeConfigFile {
    let path = std::env::var("CONCIERGE_CONFIG")
        .ok()
        .map(PathBuf::from)
        .or_else(config_file_path);

    match path {
        Some(path) if path.exists() => load_config_from(&path),
        _ => ConciergeConfigFile::default(),
    }
}

/// Standard config file path (`~/.config/concierge/config.toml`)
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("concierge").join("config.toml"))
}

/// Load a config file from an explicit path
///
/// Falls back to defaults with a warning when the file is unreadable or invalid.
#[must_use]
pub fn load_config_from(path: &Path) -> ConciergeConfigFile {
    match read_config_file(path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            ConciergeConfigFile::default()
        }
    }
}

/// Read and parse a config file
///
/// # Errors
///
/// Returns `Error::Io` if the file can't be read, `Error::Toml` if it is invalid
pub fn read_config_file(path: &Path) -> Result<ConciergeConfigFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_file() {
        let raw = r#"
            [server]
            port = 9000

            [reply]
            mode = "rules"
            fallback_to_rules = true

            [[reply.rules]]
            keywords = ["openingstijden", "open"]
            reply = "Wij zijn open van 9 tot 5."

            [voice]
            locale = "en-US"
            stability = 0.4

            [upload]
            provider = "file-upload"
            url_field = "data.url"

            [markup]
            loop_policy = "redirect"

            [prompts]
            greeting = "Hello"
        "#;

        let file: ConciergeConfigFile = toml::from_str(raw).unwrap();
        assert_eq!(file.server.port, Some(9000));
        assert_eq!(file.reply.mode.as_deref(), Some("rules"));
        assert_eq!(file.reply.fallback_to_rules, Some(true));
        let rules = file.reply.rules.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].keywords, vec!["openingstijden", "open"]);
        assert_eq!(file.voice.locale.as_deref(), Some("en-US"));
        assert_eq!(file.voice.stability, Some(0.4));
        assert_eq!(file.upload.url_field.as_deref(), Some("data.url"));
        assert_eq!(file.markup.loop_policy, Some(LoopPolicy::RedirectToEntry));
        assert_eq!(file.prompts.greeting.as_deref(), Some("Hello"));
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"[server\nport = ").unwrap();

        let config = load_config_from(file.path());
        assert!(config.server.port.is_none());
    }

    #[test]
    fn test_read_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"[server\nport = ").unwrap();

        let result = read_config_file(file.path());
        assert!(matches!(result, Err(crate::Error::Toml(_))));
    }

    #[test]
    fn test_read_reports_io_error() {
        let result = read_config_file(Path::new("/nonexistent/concierge.toml"));
        assert!(matches!(result, Err(crate::Error::Io(_))));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_config_from(Path::new("/nonexistent/concierge.toml"));
        assert!(config.reply.rules.is_none());
    }
}
