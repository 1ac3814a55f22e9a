//! OpenAI chat-completion reply provider

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::ReplyProvider;
use crate::error::ReplyGenerationError;

/// Persona and fixed facts used when no system prompt is configured
pub const DEFAULT_SYSTEM_PROMPT: &str = "Je bent een vriendelijke Nederlandse klantenservice bot \
van een concierge service. Wij zijn open van maandag tot en met vrijdag, van 9:00 tot 17:00. \
Houd je antwoorden kort: ze worden voorgelezen aan de telefoon.";

/// Model-based reply configuration
#[derive(Debug, Clone)]
pub struct OpenAiReplyConfig {
    /// Model string to request (e.g. "gpt-4o")
    pub model: String,
    /// Cap on generated tokens
    pub max_output_tokens: Option<u32>,
    /// Persona plus fixed factual context
    pub system_prompt: String,
    /// Response language, e.g. `nl-NL`
    pub locale: String,
    /// API base URL
    pub base_url: String,
}

impl Default for OpenAiReplyConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            max_output_tokens: Some(150),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            locale: "nl-NL".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

/// Reply provider backed by the chat completions endpoint
pub struct OpenAiReplyProvider {
    client: Client,
    api_key: SecretString,
    config: OpenAiReplyConfig,
}

impl OpenAiReplyProvider {
    /// Create a new provider
    #[must_use]
    pub fn new(api_key: SecretString, config: OpenAiReplyConfig) -> Self {
        Self {
            client: Client::new(),
            api_key,
            config,
        }
    }

    /// Use a preconfigured HTTP client (timeouts, proxies)
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn system_message(&self) -> String {
        format!(
            "{}\n\nRespond in the language for locale {}.",
            self.config.system_prompt.trim(),
            self.config.locale
        )
    }
}

#[async_trait]
impl ReplyProvider for OpenAiReplyProvider {
    async fn reply(&self, transcript: &str) -> Result<String, ReplyGenerationError> {
        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![
                Message {
                    role: "system",
                    content: self.system_message(),
                },
                Message {
                    role: "user",
                    content: transcript.to_string(),
                },
            ],
            max_tokens: self.config.max_output_tokens,
        };

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        tracing::debug!(model = %self.config.model, "requesting chat completion");

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReplyGenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ReplyGenerationError::Malformed(e.to_string()))?;

        let reply = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default();

        if reply.is_empty() {
            return Err(ReplyGenerationError::Empty);
        }

        Ok(reply)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_message_includes_locale() {
        let provider = OpenAiReplyProvider::new(
            SecretString::from("sk-test".to_string()),
            OpenAiReplyConfig {
                system_prompt: "  You are a hotel concierge.  ".to_string(),
                locale: "en-GB".to_string(),
                ..OpenAiReplyConfig::default()
            },
        );

        let message = provider.system_message();
        assert!(message.starts_with("You are a hotel concierge."));
        assert!(message.ends_with("locale en-GB."));
    }

    #[test]
    fn test_request_omits_missing_token_cap() {
        let request = ChatCompletionRequest {
            model: "gpt-4o",
            messages: vec![],
            max_tokens: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("max_tokens").is_none());
    }
}
