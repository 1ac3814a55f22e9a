//! Keyword-matched canned replies

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ReplyProvider;
use crate::error::ReplyGenerationError;

/// One canned intent: any keyword hit returns `reply`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRule {
    pub keywords: Vec<String>,
    pub reply: String,
}

impl ReplyRule {
    /// Create a rule from keywords and its fixed reply
    #[must_use]
    pub fn new<I, S>(keywords: I, reply: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
            reply: reply.into(),
        }
    }
}

/// Deterministic reply provider over a fixed rule set
///
/// Keywords are matched as case-insensitive substrings. Rules are tried in
/// order and the first hit wins; otherwise the default reply is returned.
#[derive(Debug, Clone)]
pub struct RuleReplyProvider {
    rules: Vec<ReplyRule>,
    default_reply: String,
}

impl RuleReplyProvider {
    /// Create a provider; keywords are lowercased once here
    #[must_use]
    pub fn new(rules: Vec<ReplyRule>, default_reply: impl Into<String>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| ReplyRule {
                keywords: rule
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect(),
                reply: rule.reply,
            })
            .collect();

        Self {
            rules,
            default_reply: default_reply.into(),
        }
    }

    /// Pick the reply for a transcript
    #[must_use]
    pub fn match_reply(&self, transcript: &str) -> &str {
        let haystack = transcript.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| haystack.contains(k.as_str())))
            .map_or(self.default_reply.as_str(), |rule| rule.reply.as_str())
    }
}

#[async_trait]
impl ReplyProvider for RuleReplyProvider {
    async fn reply(&self, transcript: &str) -> Result<String, ReplyGenerationError> {
        Ok(self.match_reply(transcript).to_string())
    }

    fn name(&self) -> &'static str {
        "rules"
    }
}
