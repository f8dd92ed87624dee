//! Text provider trait.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Text provider kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextProviderKind {
    /// Google Gemini text models.
    Gemini,
}

impl std::fmt::Display for TextProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
        }
    }
}

/// Trait for LLMs that turn one prompt into one text blob.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Sends `prompt` and returns the concatenated text of the reply.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Returns the kind of this provider.
    fn kind(&self) -> TextProviderKind;

    /// Checks if the provider is reachable and authenticated.
    async fn health_check(&self) -> Result<()>;
}
