//! Generic multipart file-upload services (file.io and similar)

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::Form;
use secrecy::{ExposeSecret, SecretString};

use super::{AssetHost, HostedAudioAsset, StagedAudio, extract_url};
use crate::error::UploadError;
use crate::{Error, Result};

/// File-upload service endpoint and response shape
#[derive(Debug)]
pub struct FileUploadConfig {
    /// Upload endpoint
    pub endpoint: String,
    /// JSON field (dotted path) holding the public URL
    pub url_field: String,
    /// Optional retention hint sent as `expires`, e.g. `1d`
    pub expires: Option<String>,
    /// Optional bearer token
    pub api_key: Option<SecretString>,
}

impl Default for FileUploadConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://file.io".to_string(),
            url_field: "link".to_string(),
            expires: None,
            api_key: None,
        }
    }
}

/// Uploads audio as a multipart `file` field
pub struct FileUploadHost {
    client: Client,
    config: FileUploadConfig,
}

impl FileUploadHost {
    /// Create a new file-upload host
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint or URL field is empty
    pub fn new(config: FileUploadConfig) -> Result<Self> {
        if config.endpoint.trim().is_empty() || config.url_field.trim().is_empty() {
            return Err(Error::Config(
                "file upload endpoint and URL field are required".to_string(),
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
}

#[async_trait]
impl AssetHost for FileUploadHost {
    async fn upload(
        &self,
        audio: &StagedAudio,
    ) -> std::result::Result<HostedAudioAsset, UploadError> {
        let mut form = Form::new().part("file", audio.to_part().await?);
        if let Some(expires) = &self.config.expires {
            form = form.text("expires", expires.clone());
        }

        let mut request = self.client.post(&self.config.endpoint).multipart(form);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        tracing::debug!(endpoint = %self.config.endpoint, bytes = audio.len(), "uploading audio");

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(UploadError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let url = extract_url(&body, &self.config.url_field)?;
        tracing::info!(url = %url, "audio hosted");
        Ok(HostedAudioAsset { url })
    }

    fn name(&self) -> &'static str {
        "file-upload"
    }
}
