//! Vendor adapter tests against mock HTTP servers

use concierge_voicebot::error::{ReplyGenerationError, SynthesisError, UploadError};
use concierge_voicebot::hosting::{
    AssetHost, CloudinaryConfig, CloudinaryHost, FileUploadConfig, FileUploadHost, StagedAudio,
};
use concierge_voicebot::reply::{OpenAiReplyConfig, OpenAiReplyProvider, ReplyProvider};
use concierge_voicebot::voice::{
    ElevenLabsConfig, ElevenLabsSynthesizer, OpenAiSpeechConfig, OpenAiSynthesizer,
    SpeechSynthesizer, SynthesizedAudio, Transcriber, WhisperTranscriber,
};
use secrecy::SecretString;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{
        bearer_token, body_partial_json, body_string_contains, header, method, path, query_param,
    },
};

fn key(value: &str) -> SecretString {
    SecretString::from(value.to_string())
}

/// ASCII payload so multipart bodies stay matchable as text
fn staged() -> StagedAudio {
    StagedAudio::stage(&SynthesizedAudio::mp3(b"ID3-fake-audio".to_vec()), None).unwrap()
}

// ============================================================================
// OpenAI chat replies
// ============================================================================

fn reply_provider(server: &MockServer) -> OpenAiReplyProvider {
    OpenAiReplyProvider::new(
        key("sk-test"),
        OpenAiReplyConfig {
            base_url: server.uri(),
            ..OpenAiReplyConfig::default()
        },
    )
}

#[tokio::test]
async fn test_openai_reply_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(bearer_token("sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o",
            "max_tokens": 150,
            "messages": [
                {"role": "system"},
                {"role": "user", "content": "Hoe laat gaan jullie open?"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "  Wij openen om 9 uur.  "}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = reply_provider(&server)
        .reply("Hoe laat gaan jullie open?")
        .await
        .unwrap();

    assert_eq!(reply, "Wij openen om 9 uur.");
}

#[tokio::test]
async fn test_openai_reply_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let err = reply_provider(&server).reply("hallo").await.unwrap_err();
    assert!(
        matches!(err, ReplyGenerationError::Api { status: 429, ref body } if body == "rate limited")
    );
}

#[tokio::test]
async fn test_openai_reply_empty_content() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "   "}}]
        })))
        .mount(&server)
        .await;

    let err = reply_provider(&server).reply("hallo").await.unwrap_err();
    assert!(matches!(err, ReplyGenerationError::Empty));
}

#[tokio::test]
async fn test_openai_reply_malformed_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = reply_provider(&server).reply("hallo").await.unwrap_err();
    assert!(matches!(err, ReplyGenerationError::Malformed(_)));
}

// ============================================================================
// ElevenLabs streaming synthesis
// ============================================================================

fn elevenlabs(server: &MockServer) -> ElevenLabsSynthesizer {
    ElevenLabsSynthesizer::new(
        key("el-test"),
        ElevenLabsConfig {
            base_url: server.uri(),
            ..ElevenLabsConfig::default()
        },
    )
    .unwrap()
}

#[tokio::test]
async fn test_elevenlabs_streams_audio() {
    let server = MockServer::start().await;
    let audio = vec![0x49, 0x44, 0x33, 0x04, 0x00, 0x00];

    Mock::given(method("POST"))
        .and(path("/text-to-speech/YUdpWWny7k5yb4QCeweX/stream"))
        .and(query_param("output_format", "mp3_44100_128"))
        .and(header("xi-api-key", "el-test"))
        .and(body_partial_json(json!({
            "text": "Wij zijn open.",
            "model_id": "eleven_multilingual_v2",
            "voice_settings": {"use_speaker_boost": true}
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/mpeg")
                .set_body_bytes(audio.clone()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = elevenlabs(&server).synthesize("Wij zijn open.").await.unwrap();

    assert_eq!(result.bytes, audio);
    assert_eq!(result.content_type, "audio/mpeg");
}

#[tokio::test]
async fn test_elevenlabs_unauthorized() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let err = elevenlabs(&server).synthesize("hallo").await.unwrap_err();
    assert!(matches!(err, SynthesisError::Api { status: 401, .. }));
}

#[tokio::test]
async fn test_elevenlabs_empty_stream() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let err = elevenlabs(&server).synthesize("hallo").await.unwrap_err();
    assert!(matches!(err, SynthesisError::EmptyAudio));
}

// ============================================================================
// OpenAI speech
// ============================================================================

#[tokio::test]
async fn test_openai_speech_reads_whole_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/audio/speech"))
        .and(bearer_token("sk-test"))
        .and(body_partial_json(json!({
            "model": "tts-1",
            "voice": "alloy",
            "input": "Goedemiddag",
            "response_format": "mp3"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1_u8, 2, 3]))
        .expect(1)
        .mount(&server)
        .await;

    let synthesizer = OpenAiSynthesizer::new(
        key("sk-test"),
        OpenAiSpeechConfig {
            base_url: server.uri(),
            ..OpenAiSpeechConfig::default()
        },
    )
    .unwrap();

    let audio = synthesizer.synthesize("Goedemiddag").await.unwrap();
    assert_eq!(audio.bytes, vec![1, 2, 3]);
}

// ============================================================================
// Cloudinary hosting
// ============================================================================

fn cloudinary(server: &MockServer) -> CloudinaryHost {
    CloudinaryHost::new(CloudinaryConfig {
        cloud_name: "demo".to_string(),
        api_key: "123456".to_string(),
        api_secret: key("shh"),
        upload_preset: Some("concierge_voicebot".to_string()),
        folder: Some("voicebot-audio".to_string()),
        api_base: server.uri(),
    })
    .unwrap()
}

#[tokio::test]
async fn test_cloudinary_signed_upload() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/demo/video/upload"))
        .and(body_string_contains("name=\"signature_algorithm\""))
        .and(body_string_contains("name=\"signature\""))
        .and(body_string_contains("name=\"timestamp\""))
        .and(body_string_contains("voicebot-audio"))
        .and(body_string_contains("concierge_voicebot"))
        .and(body_string_contains("123456"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "public_id": "voicebot-audio/abc",
            "secure_url": "https://res.cloudinary.com/demo/video/upload/voicebot-audio/abc.mp3"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let asset = cloudinary(&server).upload(&staged()).await.unwrap();
    assert_eq!(
        asset.url,
        "https://res.cloudinary.com/demo/video/upload/voicebot-audio/abc.mp3"
    );
}

#[tokio::test]
async fn test_cloudinary_missing_secure_url() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/demo/video/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"public_id": "abc"})))
        .mount(&server)
        .await;

    let err = cloudinary(&server).upload(&staged()).await.unwrap_err();
    assert!(matches!(err, UploadError::MissingUrl(ref field) if field == "secure_url"));
}

#[tokio::test]
async fn test_cloudinary_server_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&server)
        .await;

    let err = cloudinary(&server).upload(&staged()).await.unwrap_err();
    assert!(matches!(err, UploadError::Api { status: 500, .. }));
}

// ============================================================================
// Generic file-upload hosting
// ============================================================================

#[tokio::test]
async fn test_file_upload_reads_configured_field() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(bearer_token("fu-key"))
        .and(body_string_contains("name=\"expires\""))
        .and(body_string_contains("concierge-turn-"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": {"url": "https://tmp.example/dl/a.mp3"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let host = FileUploadHost::new(FileUploadConfig {
        endpoint: format!("{}/upload", server.uri()),
        url_field: "data.url".to_string(),
        expires: Some("1d".to_string()),
        api_key: Some(key("fu-key")),
    })
    .unwrap();

    let asset = host.upload(&staged()).await.unwrap();
    assert_eq!(asset.url, "https://tmp.example/dl/a.mp3");
}

#[tokio::test]
async fn test_file_upload_default_link_field() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "link": "https://file.example/xyz"})),
        )
        .mount(&server)
        .await;

    let host = FileUploadHost::new(FileUploadConfig {
        endpoint: server.uri(),
        ..FileUploadConfig::default()
    })
    .unwrap();

    let asset = host.upload(&staged()).await.unwrap();
    assert_eq!(asset.url, "https://file.example/xyz");
}

#[tokio::test]
async fn test_file_upload_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(413).set_body_string("too large"))
        .mount(&server)
        .await;

    let host = FileUploadHost::new(FileUploadConfig {
        endpoint: server.uri(),
        ..FileUploadConfig::default()
    })
    .unwrap();

    let err = host.upload(&staged()).await.unwrap_err();
    assert!(matches!(err, UploadError::Api { status: 413, .. }));
}

// ============================================================================
// Whisper transcription
// ============================================================================

#[tokio::test]
async fn test_whisper_transcribes_with_language_hint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/audio/transcriptions"))
        .and(bearer_token("sk-test"))
        .and(body_string_contains("whisper-1"))
        .and(body_string_contains("name=\"language\""))
        .and(body_string_contains("recording.webm"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"text": " Wat zijn jullie openingstijden? "})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let transcriber =
        WhisperTranscriber::new(key("sk-test"), "whisper-1".to_string(), Some("nl".to_string()))
            .unwrap()
            .with_base_url(server.uri());

    let text = transcriber.transcribe(b"webm", "audio/webm").await.unwrap();
    assert_eq!(text, "Wat zijn jullie openingstijden?");
}

#[tokio::test]
async fn test_whisper_error_is_stt_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let transcriber = WhisperTranscriber::new(key("sk-test"), "whisper-1".to_string(), None)
        .unwrap()
        .with_base_url(server.uri());

    let err = transcriber.transcribe(b"wav", "audio/wav").await.unwrap_err();
    assert!(matches!(err, concierge_voicebot::Error::Stt(_)));
}
