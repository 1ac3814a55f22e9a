//! Configuration management for the concierge voicebot
//!
//! Values resolve as `env > toml > default`. A `.env` file in the working
//! directory is loaded into the environment first.

pub mod file;

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

use self::file::ConciergeConfigFile;
use crate::hosting::{AssetHost, CloudinaryConfig, CloudinaryHost, FileUploadConfig, FileUploadHost};
use crate::pipeline::{CallTurnPipeline, LoopPolicy, MarkupConfig, Prompts};
use crate::reply::{
    DEFAULT_SYSTEM_PROMPT, OpenAiReplyConfig, OpenAiReplyProvider, ReplyProvider, ReplyRule,
    RuleReplyProvider,
};
use crate::voice::{
    ElevenLabsConfig, ElevenLabsSynthesizer, OpenAiSpeechConfig, OpenAiSynthesizer,
    SpeechSynthesizer, Transcriber, VoiceSettings, WhisperTranscriber, language_hint,
};
use crate::{Error, Result};

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Concierge voicebot configuration
#[derive(Debug)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Reply generation
    pub reply: ReplyConfig,

    /// Speech synthesis and recognition
    pub voice: VoiceConfig,

    /// Audio hosting
    pub upload: UploadConfig,

    /// Markup rendering
    pub markup: MarkupConfig,

    /// Fixed phrases
    pub prompts: Prompts,

    /// API keys
    pub api_keys: ApiKeys,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Static web files, served only if the directory exists
    pub static_dir: PathBuf,

    /// Timeout applied to every outbound vendor request
    pub http_timeout: Duration,
}

/// How reply text is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMode {
    /// Keyword rules only
    Rules,
    /// Chat completion model
    Model,
}

impl FromStr for ReplyMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "rules" | "rule" => Ok(Self::Rules),
            "model" | "llm" | "gpt" => Ok(Self::Model),
            other => Err(Error::Config(format!("unknown reply mode: {other}"))),
        }
    }
}

/// Reply generation configuration
#[derive(Debug, Clone)]
pub struct ReplyConfig {
    pub mode: ReplyMode,

    /// Chat model identifier
    pub model: String,

    pub max_output_tokens: Option<u32>,

    /// Persona and fixed facts
    pub system_prompt: String,

    /// Answer from the rules when the model fails
    pub fallback_to_rules: bool,

    pub rules: Vec<ReplyRule>,

    /// Reply when no rule matches
    pub default_reply: String,
}

/// Speech synthesis provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsProvider {
    ElevenLabs,
    OpenAi,
    None,
}

impl FromStr for TtsProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "elevenlabs" | "eleven" => Ok(Self::ElevenLabs),
            "openai" => Ok(Self::OpenAi),
            "none" | "off" | "" => Ok(Self::None),
            other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
        }
    }
}

/// Voice configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Locale for recognition, speech and replies
    pub locale: String,

    pub tts_provider: TtsProvider,

    /// Provider voice; the provider default applies when unset
    pub voice_id: Option<String>,

    /// Provider model; the provider default applies when unset
    pub tts_model: Option<String>,

    /// `ElevenLabs` tuning
    pub settings: VoiceSettings,

    /// Platform voice for text-only replies
    pub say_voice: Option<String>,

    /// Transcription model for uploaded recordings
    pub stt_model: String,
}

/// Audio hosting provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadProvider {
    Cloudinary,
    FileUpload,
    None,
}

impl FromStr for UploadProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cloudinary" => Ok(Self::Cloudinary),
            "file-upload" | "file_upload" | "fileio" | "file.io" => Ok(Self::FileUpload),
            "none" | "off" | "" => Ok(Self::None),
            other => Err(Error::Config(format!("unknown upload provider: {other}"))),
        }
    }
}

/// Audio hosting configuration
#[derive(Debug)]
pub struct UploadConfig {
    pub provider: UploadProvider,

    pub cloud_name: Option<String>,
    pub cloudinary_api_key: Option<String>,
    pub cloudinary_api_secret: Option<SecretString>,
    pub upload_preset: Option<String>,
    pub folder: Option<String>,

    /// File-upload service endpoint
    pub endpoint: String,
    /// JSON field holding the hosted URL
    pub url_field: String,
    pub expires: Option<String>,
    pub file_upload_api_key: Option<SecretString>,
}

/// API keys for external services
#[derive(Debug, Default)]
pub struct ApiKeys {
    /// `OpenAI` key (chat, TTS and Whisper)
    pub openai: Option<SecretString>,

    /// `ElevenLabs` key
    pub elevenlabs: Option<SecretString>,
}

/// Rules used when none are configured
#[must_use]
pub fn default_rules() -> Vec<ReplyRule> {
    vec![ReplyRule::new(
        ["openingstijden", "open", "hours"],
        "Wij zijn open van maandag tot en met vrijdag, van 9:00 tot 17:00.",
    )]
}

const DEFAULT_RULE_REPLY: &str =
    "Ik kan u helpen met vragen over onze openingstijden. Wat wilt u weten?";

impl Config {
    /// Load configuration from `.env`, the process environment and the TOML file
    ///
    /// # Errors
    ///
    /// Returns error if a provider or mode name is unknown
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env file");
        }
        let fc = file::load_config_file();
        Self::from_sources(|key| std::env::var(key).ok(), fc)
    }

    /// Resolve configuration from an environment lookup and a parsed file
    ///
    /// # Errors
    ///
    /// Returns error if a provider or mode name is unknown
    pub fn from_sources<F>(lookup: F, fc: ConciergeConfigFile) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let secret =
            |value: Option<String>| value.filter(|v| !v.is_empty()).map(SecretString::from);

        // API keys (env > toml > None)
        let api_keys = ApiKeys {
            openai: secret(env("OPENAI_API_KEY").or(fc.api_keys.openai)),
            elevenlabs: secret(
                env("ELEVEN_API_KEY")
                    .or_else(|| env("ELEVENLABS_API_KEY"))
                    .or(fc.api_keys.elevenlabs),
            ),
        };

        // Server (env > toml > default)
        let server = ServerConfig {
            port: env("CONCIERGE_PORT")
                .or_else(|| env("PORT"))
                .and_then(|s| s.parse().ok())
                .or(fc.server.port)
                .unwrap_or(DEFAULT_PORT),
            static_dir: env("CONCIERGE_STATIC_DIR")
                .or(fc.server.static_dir)
                .map_or_else(|| PathBuf::from("static"), PathBuf::from),
            http_timeout: Duration::from_secs(
                env("CONCIERGE_HTTP_TIMEOUT")
                    .and_then(|s| s.parse().ok())
                    .or(fc.server.http_timeout_secs)
                    .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            ),
        };

        // Reply mode defaults to the model whenever it can be reached
        let mode = match env("CONCIERGE_REPLY_MODE").or(fc.reply.mode) {
            Some(raw) => raw.parse()?,
            None if api_keys.openai.is_some() => ReplyMode::Model,
            None => ReplyMode::Rules,
        };

        let reply = ReplyConfig {
            mode,
            model: env("CONCIERGE_LLM_MODEL")
                .or(fc.reply.model)
                .unwrap_or_else(|| "gpt-4o".to_string()),
            max_output_tokens: env("CONCIERGE_LLM_MAX_TOKENS")
                .and_then(|s| s.parse().ok())
                .or(fc.reply.max_output_tokens)
                .or(Some(150)),
            system_prompt: env("CONCIERGE_SYSTEM_PROMPT")
                .or(fc.reply.system_prompt)
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            fallback_to_rules: fc.reply.fallback_to_rules.unwrap_or(false),
            rules: fc.reply.rules.unwrap_or_else(default_rules),
            default_reply: fc
                .reply
                .default_reply
                .unwrap_or_else(|| DEFAULT_RULE_REPLY.to_string()),
        };

        let tts_provider = match env("CONCIERGE_TTS_PROVIDER").or(fc.voice.tts_provider) {
            Some(raw) => raw.parse()?,
            None if api_keys.elevenlabs.is_some() => TtsProvider::ElevenLabs,
            None => TtsProvider::None,
        };

        let default_settings = VoiceSettings::default();
        let voice = VoiceConfig {
            locale: env("CONCIERGE_LOCALE")
                .or(fc.voice.locale)
                .unwrap_or_else(|| "nl-NL".to_string()),
            tts_provider,
            voice_id: env("ELEVENLABS_VOICE_ID").or(fc.voice.voice_id),
            tts_model: env("ELEVENLABS_MODEL_ID").or(fc.voice.tts_model),
            settings: VoiceSettings {
                stability: fc.voice.stability.unwrap_or(default_settings.stability),
                similarity_boost: fc
                    .voice
                    .similarity_boost
                    .unwrap_or(default_settings.similarity_boost),
                style: fc.voice.style.unwrap_or(default_settings.style),
                use_speaker_boost: fc
                    .voice
                    .speaker_boost
                    .unwrap_or(default_settings.use_speaker_boost),
            },
            say_voice: env("CONCIERGE_SAY_VOICE").or(fc.voice.say_voice),
            stt_model: fc
                .voice
                .stt_model
                .unwrap_or_else(|| "whisper-1".to_string()),
        };

        // Upload (env > toml > default)
        let cloud_name = env("CLOUDINARY_CLOUD_NAME").or(fc.upload.cloud_name);
        let cloudinary_api_key = env("CLOUDINARY_API_KEY").or(fc.upload.api_key);
        let cloudinary_api_secret = secret(env("CLOUDINARY_API_SECRET").or(fc.upload.api_secret));
        let endpoint = env("FILE_UPLOAD_URL").or(fc.upload.endpoint);

        let provider = match env("CONCIERGE_UPLOAD_PROVIDER").or(fc.upload.provider) {
            Some(raw) => raw.parse()?,
            None if cloud_name.is_some()
                && cloudinary_api_key.is_some()
                && cloudinary_api_secret.is_some() =>
            {
                UploadProvider::Cloudinary
            }
            None if endpoint.is_some() => UploadProvider::FileUpload,
            None => UploadProvider::None,
        };

        let file_upload_defaults = FileUploadConfig::default();
        let upload = UploadConfig {
            provider,
            cloud_name,
            cloudinary_api_key,
            cloudinary_api_secret,
            upload_preset: env("CLOUDINARY_UPLOAD_PRESET")
                .or(fc.upload.upload_preset)
                .or_else(|| Some("concierge_voicebot".to_string())),
            folder: env("CLOUDINARY_FOLDER")
                .or(fc.upload.folder)
                .or_else(|| Some("voicebot-audio".to_string())),
            endpoint: endpoint.unwrap_or(file_upload_defaults.endpoint),
            url_field: fc.upload.url_field.unwrap_or(file_upload_defaults.url_field),
            expires: fc.upload.expires,
            file_upload_api_key: secret(env("FILE_UPLOAD_API_KEY")),
        };

        let markup_defaults = MarkupConfig::default();
        let loop_policy = match env("CONCIERGE_LOOP_POLICY") {
            Some(raw) => raw.parse()?,
            None => fc.markup.loop_policy.unwrap_or(LoopPolicy::Gather),
        };
        let markup = MarkupConfig {
            locale: voice.locale.clone(),
            gather_timeout_secs: env("CONCIERGE_GATHER_TIMEOUT")
                .and_then(|s| s.parse().ok())
                .or(fc.markup.gather_timeout_secs)
                .unwrap_or(markup_defaults.gather_timeout_secs),
            speech_timeout: fc.markup.speech_timeout,
            say_voice: voice.say_voice.clone(),
            loop_policy,
            ..markup_defaults
        };

        let prompt_defaults = Prompts::default();
        let prompts = Prompts {
            greeting: fc.prompts.greeting.unwrap_or(prompt_defaults.greeting),
            retry: fc.prompts.retry.unwrap_or(prompt_defaults.retry),
            apology: fc.prompts.apology.unwrap_or(prompt_defaults.apology),
            error: fc.prompts.error.unwrap_or(prompt_defaults.error),
        };

        Ok(Self {
            server,
            reply,
            voice,
            upload,
            markup,
            prompts,
            api_keys,
        })
    }

    /// Shared HTTP client with the configured request timeout
    ///
    /// # Errors
    ///
    /// Returns error if the client cannot be built
    pub fn http_client(&self) -> Result<Client> {
        Ok(Client::builder().timeout(self.server.http_timeout).build()?)
    }

    /// Build the primary reply provider and the optional rule fallback
    ///
    /// # Errors
    ///
    /// Returns error if model mode is selected without an `OpenAI` key
    pub fn build_reply_providers(
        &self,
        client: &Client,
    ) -> Result<(Arc<dyn ReplyProvider>, Option<Arc<dyn ReplyProvider>>)> {
        let rules = || {
            Arc::new(RuleReplyProvider::new(
                self.reply.rules.clone(),
                self.reply.default_reply.clone(),
            )) as Arc<dyn ReplyProvider>
        };

        match self.reply.mode {
            ReplyMode::Rules => Ok((rules(), None)),
            ReplyMode::Model => {
                let key = self.api_keys.openai.as_ref().ok_or_else(|| {
                    Error::Config("OPENAI_API_KEY is required for model replies".to_string())
                })?;
                let provider = OpenAiReplyProvider::new(
                    reveal(key),
                    OpenAiReplyConfig {
                        model: self.reply.model.clone(),
                        max_output_tokens: self.reply.max_output_tokens,
                        system_prompt: self.reply.system_prompt.clone(),
                        locale: self.voice.locale.clone(),
                        ..OpenAiReplyConfig::default()
                    },
                )
                .with_client(client.clone());

                let primary: Arc<dyn ReplyProvider> = Arc::new(provider);
                Ok((primary, self.reply.fallback_to_rules.then(rules)))
            }
        }
    }

    /// Build the configured speech synthesizer
    ///
    /// # Errors
    ///
    /// Returns error if the selected provider has no API key
    pub fn build_synthesizer(&self, client: &Client) -> Result<Option<Arc<dyn SpeechSynthesizer>>> {
        match self.voice.tts_provider {
            TtsProvider::None => Ok(None),
            TtsProvider::ElevenLabs => {
                let key = self.api_keys.elevenlabs.as_ref().ok_or_else(|| {
                    Error::Config("ELEVEN_API_KEY is required for ElevenLabs TTS".to_string())
                })?;
                let defaults = ElevenLabsConfig::default();
                let config = ElevenLabsConfig {
                    voice_id: self.voice.voice_id.clone().unwrap_or(defaults.voice_id),
                    model_id: self.voice.tts_model.clone().unwrap_or(defaults.model_id),
                    voice_settings: self.voice.settings,
                    ..defaults
                };
                let synthesizer =
                    ElevenLabsSynthesizer::new(reveal(key), config)?.with_client(client.clone());
                Ok(Some(Arc::new(synthesizer)))
            }
            TtsProvider::OpenAi => {
                let key = self.api_keys.openai.as_ref().ok_or_else(|| {
                    Error::Config("OPENAI_API_KEY is required for OpenAI TTS".to_string())
                })?;
                let defaults = OpenAiSpeechConfig::default();
                let config = OpenAiSpeechConfig {
                    voice: self.voice.voice_id.clone().unwrap_or(defaults.voice),
                    model: self.voice.tts_model.clone().unwrap_or(defaults.model),
                    ..defaults
                };
                let synthesizer =
                    OpenAiSynthesizer::new(reveal(key), config)?.with_client(client.clone());
                Ok(Some(Arc::new(synthesizer)))
            }
        }
    }

    /// Build the configured asset host
    ///
    /// # Errors
    ///
    /// Returns error if Cloudinary is selected without credentials
    pub fn build_host(&self, client: &Client) -> Result<Option<Arc<dyn AssetHost>>> {
        let upload = &self.upload;
        match upload.provider {
            UploadProvider::None => Ok(None),
            UploadProvider::Cloudinary => {
                let (Some(cloud_name), Some(api_key), Some(api_secret)) = (
                    upload.cloud_name.as_ref(),
                    upload.cloudinary_api_key.as_ref(),
                    upload.cloudinary_api_secret.as_ref(),
                ) else {
                    return Err(Error::Config(
                        "CLOUDINARY_CLOUD_NAME, CLOUDINARY_API_KEY and CLOUDINARY_API_SECRET are required"
                            .to_string(),
                    ));
                };
                let host = CloudinaryHost::new(CloudinaryConfig {
                    cloud_name: cloud_name.clone(),
                    api_key: api_key.clone(),
                    api_secret: reveal(api_secret),
                    upload_preset: upload.upload_preset.clone(),
                    folder: upload.folder.clone(),
                    api_base: DEFAULT_CLOUDINARY_API_BASE.to_string(),
                })?
                .with_client(client.clone());
                Ok(Some(Arc::new(host)))
            }
            UploadProvider::FileUpload => {
                let host = FileUploadHost::new(FileUploadConfig {
                    endpoint: upload.endpoint.clone(),
                    url_field: upload.url_field.clone(),
                    expires: upload.expires.clone(),
                    api_key: upload.file_upload_api_key.as_ref().map(reveal),
                })?
                .with_client(client.clone());
                Ok(Some(Arc::new(host)))
            }
        }
    }

    /// Build the recording transcriber, available whenever an `OpenAI` key is set
    ///
    /// # Errors
    ///
    /// Returns error if the transcriber cannot be constructed
    pub fn build_transcriber(&self, client: &Client) -> Result<Option<Arc<dyn Transcriber>>> {
        let Some(key) = self.api_keys.openai.as_ref() else {
            return Ok(None);
        };
        let transcriber = WhisperTranscriber::new(
            reveal(key),
            self.voice.stt_model.clone(),
            language_hint(&self.voice.locale),
        )?
        .with_client(client.clone());
        Ok(Some(Arc::new(transcriber)))
    }

    /// Assemble the call-turn pipeline from the configured providers
    ///
    /// # Errors
    ///
    /// Returns error if a selected provider is missing its credentials
    pub fn build_pipeline(&self) -> Result<CallTurnPipeline> {
        let client = self.http_client()?;
        let (reply, fallback) = self.build_reply_providers(&client)?;

        let mut builder = CallTurnPipeline::builder(reply)
            .prompts(self.prompts.clone())
            .markup(self.markup.clone());
        if let Some(fallback) = fallback {
            builder = builder.reply_fallback(fallback);
        }
        if let Some(synthesizer) = self.build_synthesizer(&client)? {
            builder = builder.synthesizer(synthesizer);
        }
        if let Some(host) = self.build_host(&client)? {
            builder = builder.host(host);
        }
        if let Some(transcriber) = self.build_transcriber(&client)? {
            builder = builder.transcriber(transcriber);
        }

        tracing::info!(
            reply = ?self.reply.mode,
            tts = ?self.voice.tts_provider,
            upload = ?self.upload.provider,
            locale = %self.voice.locale,
            "pipeline configured"
        );

        Ok(builder.build())
    }
}

fn reveal(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_string())
}
