//! ElevenLabs text-to-speech provider.

use crate::config::ELEVENLABS_API_KEY;
use crate::error::{parse_retry_after, sanitize_error_message, Result, StoryReelError};
use crate::speech::provider::{ensure_text, SpeechProvider};
use crate::speech::types::{GeneratedAudio, SpeechProviderKind, SpeechRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const API_BASE: &str = "https://api.elevenlabs.io/v1";

/// Default narration voice ("Adam").
pub const DEFAULT_VOICE_ID: &str = "pNInz6obpgDQGcFmaJgB";

/// ElevenLabs synthesis model variants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ElevenLabsModel {
    /// English monolingual v1 (default).
    #[default]
    MonolingualV1,
    /// Multilingual v2.
    MultilingualV2,
    /// Custom model id.
    Custom(String),
}

impl ElevenLabsModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &str {
        match self {
            Self::MonolingualV1 => "eleven_monolingual_v1",
            Self::MultilingualV2 => "eleven_multilingual_v2",
            Self::Custom(id) => id,
        }
    }
}

/// Builder for ElevenLabsProvider.
#[derive(Debug, Clone, Default)]
pub struct ElevenLabsProviderBuilder {
    api_key: Option<String>,
    model: ElevenLabsModel,
}

impl ElevenLabsProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `ELEVENLABS_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the synthesis model.
    pub fn model(mut self, model: ElevenLabsModel) -> Self {
        self.model = model;
        self
    }

    /// Builds the provider, resolving the API key.
    pub fn build(self) -> Result<ElevenLabsProvider> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var(ELEVENLABS_API_KEY).ok())
            .ok_or_else(|| {
                StoryReelError::Auth("ELEVENLABS_API_KEY not set and no API key provided".into())
            })?;

        Ok(ElevenLabsProvider {
            client: reqwest::Client::new(),
            api_key,
            model: self.model,
        })
    }
}

/// ElevenLabs text-to-speech provider.
pub struct ElevenLabsProvider {
    client: reqwest::Client,
    api_key: String,
    model: ElevenLabsModel,
}

impl ElevenLabsProvider {
    /// Creates a new `ElevenLabsProviderBuilder`.
    pub fn builder() -> ElevenLabsProviderBuilder {
        ElevenLabsProviderBuilder::new()
    }

    fn parse_error(
        &self,
        status: u16,
        text: &str,
        headers: &reqwest::header::HeaderMap,
    ) -> StoryReelError {
        let text = sanitize_error_message(text);

        if let Ok(error_resp) = serde_json::from_str::<ElevenLabsErrorResponse>(&text) {
            let message = error_resp.detail.message;
            if error_resp.detail.status.as_deref() == Some("quota_exceeded") {
                return StoryReelError::Billing(message);
            }
            if status == 401 {
                return StoryReelError::Auth(message);
            }
            return StoryReelError::Api { status, message };
        }

        match status {
            401 | 403 => StoryReelError::Auth(text),
            429 => StoryReelError::RateLimited {
                retry_after: parse_retry_after(headers).map(std::time::Duration::from_secs),
            },
            _ => StoryReelError::Api {
                status,
                message: text,
            },
        }
    }
}

#[async_trait]
impl SpeechProvider for ElevenLabsProvider {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<GeneratedAudio> {
        ensure_text(request)?;
        let url = format!("{}/text-to-speech/{}", API_BASE, request.voice_id);
        let body = ElevenLabsRequest::new(request, self.model.as_str());

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header("Accept", "audio/mpeg")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status.as_u16(), &text, &headers));
        }

        let data = response.bytes().await?.to_vec();
        if data.is_empty() {
            return Err(StoryReelError::UnexpectedResponse(
                "ElevenLabs returned an empty audio body".into(),
            ));
        }
        tracing::debug!(bytes = data.len(), voice = %request.voice_id, "synthesized narration");
        Ok(GeneratedAudio::mp3(data))
    }

    fn kind(&self) -> SpeechProviderKind {
        SpeechProviderKind::ElevenLabs
    }

    async fn health_check(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/user", API_BASE))
            .header("xi-api-key", &self.api_key)
            .send()
            .await?;

        match response.status().as_u16() {
            401 | 403 => Err(StoryReelError::Auth("Invalid API key".into())),
            s if !(200..300).contains(&s) => Err(StoryReelError::Api {
                status: s,
                message: "Health check failed".into(),
            }),
            _ => Ok(()),
        }
    }
}

// Request types

#[derive(Debug, Serialize)]
struct ElevenLabsRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: ElevenLabsVoiceSettings,
}

#[derive(Debug, Serialize)]
struct ElevenLabsVoiceSettings {
    stability: f32,
    similarity_boost: f32,
    style: f32,
    use_speaker_boost: bool,
}

impl<'a> ElevenLabsRequest<'a> {
    fn new(request: &'a SpeechRequest, model_id: &'a str) -> Self {
        Self {
            text: &request.text,
            model_id,
            voice_settings: ElevenLabsVoiceSettings {
                stability: request.settings.stability,
                similarity_boost: request.settings.similarity_boost,
                style: 0.0,
                use_speaker_boost: true,
            },
        }
    }
}

// Response types

#[derive(Debug, Deserialize)]
struct ElevenLabsErrorResponse {
    detail: ElevenLabsErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ElevenLabsErrorDetail {
    #[serde(default)]
    status: Option<String>,
    message: String,
}
