//! Gemini text completion provider.

use crate::config::GEMINI_API_KEY;
use crate::error::{Result, StoryReelError};
use crate::image::providers::gemini::{
    gemini_health_check, parse_gemini_error, GeminiRequest, GeminiResponse, API_BASE,
};
use crate::text::provider::{TextProvider, TextProviderKind};
use async_trait::async_trait;

/// Gemini text model variants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GeminiTextModel {
    /// Gemini 1.5 Pro (default).
    #[default]
    Pro15,
    /// Gemini 2.0 Flash.
    Flash2,
    /// Custom model id.
    Custom(String),
}

impl GeminiTextModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pro15 => "gemini-1.5-pro",
            Self::Flash2 => "gemini-2.0-flash",
            Self::Custom(id) => id,
        }
    }
}

/// Builder for GeminiTextProvider.
#[derive(Debug, Clone, Default)]
pub struct GeminiTextProviderBuilder {
    api_key: Option<String>,
    model: GeminiTextModel,
}

impl GeminiTextProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `GEMINI_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the text model.
    pub fn model(mut self, model: GeminiTextModel) -> Self {
        self.model = model;
        self
    }

    /// Builds the provider, resolving the API key.
    pub fn build(self) -> Result<GeminiTextProvider> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var(GEMINI_API_KEY).ok())
            .ok_or_else(|| {
                StoryReelError::Auth("GEMINI_API_KEY not set and no API key provided".into())
            })?;

        Ok(GeminiTextProvider {
            client: reqwest::Client::new(),
            api_key,
            model: self.model,
        })
    }
}

/// Gemini text completion provider.
pub struct GeminiTextProvider {
    client: reqwest::Client,
    api_key: String,
    model: GeminiTextModel,
}

impl GeminiTextProvider {
    /// Creates a new `GeminiTextProviderBuilder`.
    pub fn builder() -> GeminiTextProviderBuilder {
        GeminiTextProviderBuilder::new()
    }
}

#[async_trait]
impl TextProvider for GeminiTextProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", API_BASE, self.model.as_str());

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&GeminiRequest::text(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(parse_gemini_error(status.as_u16(), &text, &headers));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        let text: String = gemini_response
            .into_parts()?
            .into_iter()
            .filter_map(|p| p.text)
            .collect();

        if text.trim().is_empty() {
            return Err(StoryReelError::UnexpectedResponse(
                "Gemini returned no text".into(),
            ));
        }
        Ok(text)
    }

    fn kind(&self) -> TextProviderKind {
        TextProviderKind::Gemini
    }

    async fn health_check(&self) -> Result<()> {
        gemini_health_check(&self.client, &self.api_key, self.model.as_str()).await
    }
}
