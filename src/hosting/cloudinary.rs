//! Cloudinary media CDN uploads

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::Form;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use super::{AssetHost, HostedAudioAsset, StagedAudio, extract_url};
use crate::error::UploadError;
use crate::{Error, Result};

/// Cloudinary account and upload destination
#[derive(Debug)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: SecretString,
    /// Upload preset applied server-side
    pub upload_preset: Option<String>,
    /// Destination folder
    pub folder: Option<String>,
    /// API base URL
    pub api_base: String,
}

/// Uploads audio to Cloudinary as a `video` resource (the type Cloudinary uses for audio)
pub struct CloudinaryHost {
    client: Client,
    config: CloudinaryConfig,
}

impl CloudinaryHost {
    /// Create a new Cloudinary host
    ///
    /// # Errors
    ///
    /// Returns error if the cloud name or credentials are missing
    pub fn new(config: CloudinaryConfig) -> Result<Self> {
        if config.cloud_name.is_empty()
            || config.api_key.is_empty()
            || config.api_secret.expose_secret().is_empty()
        {
            return Err(Error::Config(
                "Cloudinary cloud name, API key and API secret are required".to_string(),
            ));
        }

        Ok(Self {
            client: Client::new(),
            config,
        })
    }

    /// Use a preconfigured HTTP client
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/{}/video/upload",
            self.config.api_base.trim_end_matches('/'),
            self.config.cloud_name
        )
    }

    /// Parameters covered by the request signature
    fn signed_params(&self, timestamp: i64) -> Vec<(&'static str, String)> {
        let mut params = vec![("timestamp", timestamp.to_string())];
        if let Some(folder) = self.config.folder.as_ref().filter(|f| !f.is_empty()) {
            params.push(("folder", folder.clone()));
        }
        if let Some(preset) = self.config.upload_preset.as_ref().filter(|p| !p.is_empty()) {
            params.push(("upload_preset", preset.clone()));
        }
        params
    }
}

/// Compute a Cloudinary SHA-256 request signature
///
/// Parameters are sorted by name, joined as `key=value` with `&`, and the API
/// secret is appended before hashing.
#[must_use]
pub fn sign_params(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl AssetHost for CloudinaryHost {
    async fn upload(
        &self,
        audio: &StagedAudio,
    ) -> std::result::Result<HostedAudioAsset, UploadError> {
        let timestamp = chrono::Utc::now().timestamp();
        let params = self.signed_params(timestamp);
        let signature = sign_params(&params, self.config.api_secret.expose_secret());

        let mut form = Form::new()
            .part("file", audio.to_part().await?)
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");
        for (key, value) in params {
            form = form.text(key, value);
        }

        tracing::debug!(
            cloud_name = %self.config.cloud_name,
            bytes = audio.len(),
            "uploading audio to Cloudinary"
        );

        let response = self.client.post(self.upload_url()).multipart(form).send().await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(UploadError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let url = extract_url(&body, "secure_url")?;
        tracing::info!(url = %url, "audio hosted on Cloudinary");
        Ok(HostedAudioAsset { url })
    }

    fn name(&self) -> &'static str {
        "cloudinary"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CloudinaryConfig {
        CloudinaryConfig {
            cloud_name: "demo".to_string(),
            api_key: "123".to_string(),
            api_secret: SecretString::from("shh".to_string()),
            upload_preset: Some("concierge_voicebot".to_string()),
            folder: Some("voicebot-audio".to_string()),
            api_base: "https://api.cloudinary.com/v1_1".to_string(),
        }
    }

    #[test]
    fn test_signature_sorts_params() {
        let a = sign_params(
            &[("timestamp", "1".to_string()), ("folder", "x".to_string())],
            "secret",
        );
        let b = sign_params(
            &[("folder", "x".to_string()), ("timestamp", "1".to_string())],
            "secret",
        );
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_signature_matches_manual_digest() {
        let params = [
            ("timestamp", "1700000000".to_string()),
            ("upload_preset", "p".to_string()),
            ("folder", "f".to_string()),
        ];
        let expected = hex::encode(Sha256::digest(
            b"folder=f&timestamp=1700000000&upload_preset=psecret",
        ));
        assert_eq!(sign_params(&params, "secret"), expected);
    }

    #[test]
    fn test_signed_params_skip_empty() {
        let mut cfg = config();
        cfg.folder = Some(String::new());
        cfg.upload_preset = None;
        let host = CloudinaryHost::new(cfg).unwrap();
        assert_eq!(host.signed_params(5), vec![("timestamp", "5".to_string())]);
    }

    #[test]
    fn test_upload_url() {
        let host = CloudinaryHost::new(config()).unwrap();
        assert_eq!(
            host.upload_url(),
            "https://api.cloudinary.com/v1_1/demo/video/upload"
        );
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let mut cfg = config();
        cfg.api_secret = SecretString::from(String::new());
        assert!(matches!(CloudinaryHost::new(cfg), Err(Error::Config(_))));
    }
}
