//! Hosting synthesized audio behind a public URL
//!
//! Audio is staged in a scoped temporary file before upload. The file lives
//! exactly as long as its [`StagedAudio`] value, so it is removed on success,
//! on upload failure, and when a panic unwinds through the upload step.

mod cloudinary;
mod file_upload;

pub use cloudinary::{CloudinaryConfig, CloudinaryHost, sign_params};
pub use file_upload::{FileUploadConfig, FileUploadHost};

use std::io::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;

use crate::error::UploadError;
use crate::voice::SynthesizedAudio;

/// Reference to audio hosted by an external service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedAudioAsset {
    /// Publicly fetchable URL
    pub url: String,
}

/// Uploads staged audio and returns its public URL
#[async_trait]
pub trait AssetHost: Send + Sync {
    /// Upload staged audio
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, non-success status, or when the
    /// response carries no URL
    async fn upload(&self, audio: &StagedAudio) -> Result<HostedAudioAsset, UploadError>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Synthesized audio written to a temporary file, deleted on drop
#[derive(Debug)]
pub struct StagedAudio {
    file: NamedTempFile,
    len: usize,
    content_type: &'static str,
}

impl StagedAudio {
    /// Write audio to a fresh temporary file
    ///
    /// Uses the system temp directory unless `dir` is given.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created or written
    pub fn stage(audio: &SynthesizedAudio, dir: Option<&Path>) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("concierge-turn-").suffix(".mp3");
        let mut file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        file.write_all(&audio.bytes)?;
        file.flush()?;

        tracing::debug!(path = %file.path().display(), bytes = audio.bytes.len(), "staged audio");

        Ok(Self {
            file,
            len: audio.bytes.len(),
            content_type: audio.content_type,
        })
    }

    /// Stage audio on the blocking thread pool
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written or the staging task dies
    pub async fn stage_blocking(
        audio: SynthesizedAudio,
        dir: Option<PathBuf>,
    ) -> std::io::Result<Self> {
        tokio::task::spawn_blocking(move || Self::stage(&audio, dir.as_deref()))
            .await
            .map_err(std::io::Error::other)?
    }

    /// Path of the staged file
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// File name to present to the host
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path()
            .file_name()
            .map_or_else(|| "reply.mp3".to_string(), |n| n.to_string_lossy().into_owned())
    }

    /// Size in bytes
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing was staged
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// MIME type of the staged audio
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        self.content_type
    }

    /// Read the staged bytes back
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(self.path()).await
    }

    /// Build a multipart file part from the staged bytes
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read
    pub async fn to_part(&self) -> Result<reqwest::multipart::Part, UploadError> {
        let bytes = self.read().await?;
        reqwest::multipart::Part::bytes(bytes)
            .file_name(self.file_name())
            .mime_str(self.content_type)
            .map_err(UploadError::Transport)
    }
}

/// Pull a URL out of a JSON response body
///
/// `field` may be a dotted path such as `data.url`.
///
/// # Errors
///
/// Returns [`UploadError::MissingUrl`] if the body is not JSON or the field is
/// absent, empty, or not a string
pub fn extract_url(body: &str, field: &str) -> Result<String, UploadError> {
    let missing = || UploadError::MissingUrl(field.to_string());
    let value: serde_json::Value = serde_json::from_str(body).map_err(|_| missing())?;

    let url = field
        .split('.')
        .try_fold(&value, |node, key| node.get(key))
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or_else(missing)?;

    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staged_file_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let audio = SynthesizedAudio::mp3(vec![0xFF, 0xFB, 0x90]);

        let staged = StagedAudio::stage(&audio, Some(dir.path())).unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(staged.len(), 3);
        assert_eq!(std::fs::read(&path).unwrap(), vec![0xFF, 0xFB, 0x90]);
        assert!(staged.file_name().ends_with(".mp3"));

        drop(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_stage_blocking_writes_into_dir() {
        let dir = tempfile::tempdir().unwrap();

        let staged = StagedAudio::stage_blocking(
            SynthesizedAudio::mp3(vec![4, 5]),
            Some(dir.path().to_path_buf()),
        )
        .await
        .unwrap();

        assert!(staged.path().starts_with(dir.path()));
        assert_eq!(staged.read().await.unwrap(), vec![4, 5]);
    }

    #[tokio::test]
    async fn test_read_back() {
        let staged = StagedAudio::stage(&SynthesizedAudio::mp3(vec![1, 2, 3]), None).unwrap();
        assert_eq!(staged.read().await.unwrap(), vec![1, 2, 3]);
        assert_eq!(staged.content_type(), "audio/mpeg");
    }

    #[test]
    fn test_extract_url() {
        let body = r#"{"secure_url":"https://res.cloudinary.com/x/video/upload/a.mp3"}"#;
        assert_eq!(
            extract_url(body, "secure_url").unwrap(),
            "https://res.cloudinary.com/x/video/upload/a.mp3"
        );
    }

    #[test]
    fn test_extract_url_nested() {
        let body = r#"{"status":"success","data":{"url":"https://tmp.example/1/a.mp3"}}"#;
        assert_eq!(extract_url(body, "data.url").unwrap(), "https://tmp.example/1/a.mp3");
    }

    #[test]
    fn test_extract_url_missing() {
        for body in [
            r#"{"public_id":"a"}"#,
            r#"{"secure_url":""}"#,
            r#"{"secure_url":1}"#,
            "<html>",
        ] {
            let err = extract_url(body, "secure_url").unwrap_err();
            assert!(matches!(err, UploadError::MissingUrl(field) if field == "secure_url"));
        }
    }
}
