//! Reply text providers
//!
//! A [`ReplyProvider`] turns the caller's normalized transcript into the text
//! the bot says back. Providers are chosen at construction time and handed to
//! the pipeline; nothing reads a global mode flag.

mod openai;
mod rules;

pub use openai::{DEFAULT_SYSTEM_PROMPT, OpenAiReplyConfig, OpenAiReplyProvider};
pub use rules::{ReplyRule, RuleReplyProvider};

use async_trait::async_trait;

use crate::error::ReplyGenerationError;

/// Produces reply text for a caller's transcript
#[async_trait]
pub trait ReplyProvider: Send + Sync {
    /// Derive the reply for a non-empty, normalized transcript
    ///
    /// # Errors
    ///
    /// Returns error if the backing service fails or returns no text
    async fn reply(&self, transcript: &str) -> Result<String, ReplyGenerationError>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}
