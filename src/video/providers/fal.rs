//! fal.ai image-to-video provider.

use crate::config::FAL_KEY;
use crate::error::{sanitize_error_message, Result, StoryReelError};
use crate::video::provider::VideoProvider;
use crate::video::types::{
    GeneratedVideo, VideoGenerationRequest, VideoMetadata, VideoProviderKind,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::{Duration, Instant};

const QUEUE_BASE: &str = "https://queue.fal.run";

/// fal.ai image-to-video model variants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FalVideoModel {
    /// Google Veo 2 image-to-video (default).
    #[default]
    Veo2I2V,
    /// Luma Dream Machine Ray 2 Flash image-to-video.
    LumaRay2Flash,
    /// Custom fal.ai video model ID.
    Custom(String),
}

impl FalVideoModel {
    /// Returns the fal.ai model identifier string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Veo2I2V => "fal-ai/veo2/image-to-video",
            Self::LumaRay2Flash => "fal-ai/luma-dream-machine/ray-2-flash/image-to-video",
            Self::Custom(id) => id,
        }
    }
}

impl FromStr for FalVideoModel {
    type Err = StoryReelError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s {
            "" => Err(StoryReelError::InvalidRequest("empty video model".into())),
            "veo2" | "fal-ai/veo2/image-to-video" => Ok(Self::Veo2I2V),
            "luma" | "fal-ai/luma-dream-machine/ray-2-flash/image-to-video" => {
                Ok(Self::LumaRay2Flash)
            }
            other => Ok(Self::Custom(other.to_string())),
        }
    }
}

impl std::fmt::Display for FalVideoModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder for [`FalVideoProvider`].
#[derive(Debug, Clone)]
pub struct FalVideoProviderBuilder {
    api_key: Option<String>,
    model: FalVideoModel,
    poll_interval: Duration,
    timeout: Duration,
}

impl Default for FalVideoProviderBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            model: FalVideoModel::default(),
            poll_interval: Duration::from_secs(3),
            timeout: Duration::from_secs(600), // 10 minutes for video
        }
    }
}

impl FalVideoProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `FAL_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the fal.ai video model variant.
    pub fn model(mut self, model: FalVideoModel) -> Self {
        self.model = model;
        self
    }

    /// Sets the polling interval for queue status.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the maximum time to wait for one clip.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the provider, resolving the API key.
    pub fn build(self) -> Result<FalVideoProvider> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var(FAL_KEY).ok())
            .ok_or_else(|| {
                StoryReelError::Auth("FAL_KEY not set and no API key provided".into())
            })?;

        Ok(FalVideoProvider {
            client: reqwest::Client::new(),
            api_key,
            model: self.model,
            poll_interval: self.poll_interval,
            timeout: self.timeout,
        })
    }
}

/// fal.ai image-to-video provider.
///
/// Submits to the queue API, polls until the request completes, then
/// downloads the resulting clip.
#[derive(Debug)]
pub struct FalVideoProvider {
    client: reqwest::Client,
    api_key: String,
    model: FalVideoModel,
    poll_interval: Duration,
    timeout: Duration,
}

impl FalVideoProvider {
    /// Creates a new [`FalVideoProviderBuilder`].
    pub fn builder() -> FalVideoProviderBuilder {
        FalVideoProviderBuilder::new()
    }

    /// Returns the configured model.
    pub fn model(&self) -> &FalVideoModel {
        &self.model
    }

    fn parse_error(&self, status: u16, text: &str) -> StoryReelError {
        let text = sanitize_error_message(text);

        if let Ok(error_resp) = serde_json::from_str::<FalErrorResponse>(&text) {
            let detail = error_resp.detail;
            let lower = detail.to_lowercase();
            if lower.contains("unauthorized") || lower.contains("invalid key") {
                return StoryReelError::Auth(detail);
            }
            if lower.contains("rate") && lower.contains("limit") {
                return StoryReelError::RateLimited { retry_after: None };
            }
            if lower.contains("balance") || lower.contains("locked") {
                return StoryReelError::Billing(detail);
            }
            return StoryReelError::Api {
                status,
                message: detail,
            };
        }

        match status {
            401 | 403 => StoryReelError::Auth(text),
            429 => StoryReelError::RateLimited { retry_after: None },
            _ => StoryReelError::Api {
                status,
                message: text,
            },
        }
    }

    fn auth_header(&self) -> String {
        format!("Key {}", self.api_key)
    }

    /// Submits a clip request to the fal.ai queue.
    ///
    /// The returned status and response URLs are used as-is because nested
    /// model paths are routed differently from the submit endpoint.
    async fn submit(&self, request: &VideoGenerationRequest) -> Result<FalSubmitResponse> {
        let url = format!("{}/{}", QUEUE_BASE, self.model.as_str());
        let body = FalVideoRequest {
            prompt: &request.prompt,
            image_url: request.source_image_url.as_deref(),
            aspect_ratio: &request.aspect_ratio,
            duration: request.duration.as_str(),
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status.as_u16(), &text));
        }

        Ok(response.json().await?)
    }

    async fn poll_until_ready(&self, request_id: &str, status_url: &str) -> Result<()> {
        let start = Instant::now();

        loop {
            if start.elapsed() > self.timeout {
                return Err(StoryReelError::Timeout(self.timeout));
            }

            let response = self
                .client
                .get(status_url)
                .header("Authorization", self.auth_header())
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(self.parse_error(status.as_u16(), &text));
            }

            let status_response: FalStatusResponse = response.json().await?;

            match status_response.status.as_str() {
                "COMPLETED" => return Ok(()),
                "IN_QUEUE" | "IN_PROGRESS" => {
                    tracing::debug!(
                        request_id = %request_id,
                        status = %status_response.status,
                        elapsed_secs = start.elapsed().as_secs(),
                        "polling fal.ai clip generation"
                    );
                    tokio::time::sleep(self.poll_interval).await;
                }
                "FAILED" => {
                    return Err(StoryReelError::VideoGeneration(
                        "fal.ai clip generation failed".into(),
                    ));
                }
                other => {
                    return Err(StoryReelError::UnexpectedResponse(format!(
                        "fal.ai returned unexpected status: {}",
                        other
                    )));
                }
            }
        }
    }

    /// Fetches the completed result, falling back to the model-based URL
    /// when the queue's `response_url` answers 404 or 405.
    async fn fetch_result(&self, response_url: &str, request_id: &str) -> Result<String> {
        let response = self
            .client
            .get(response_url)
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        let response = match response.status().as_u16() {
            404 | 405 => {
                tracing::debug!(
                    response_url = %response_url,
                    status = response.status().as_u16(),
                    "fal.ai response_url rejected, falling back to model-based URL"
                );
                let fallback_url = format!(
                    "{}/{}/requests/{}",
                    QUEUE_BASE,
                    self.model.as_str(),
                    request_id
                );
                self.client
                    .get(&fallback_url)
                    .header("Authorization", self.auth_header())
                    .send()
                    .await?
            }
            _ => response,
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status.as_u16(), &text));
        }

        let result: FalVideoResult = response.json().await?;
        Ok(result.video.url)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(StoryReelError::Api {
                status: response.status().as_u16(),
                message: "Failed to download clip".into(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl VideoProvider for FalVideoProvider {
    async fn generate(&self, request: &VideoGenerationRequest) -> Result<GeneratedVideo> {
        let start = Instant::now();

        if request.source_image_url.is_none() {
            return Err(StoryReelError::InvalidRequest(
                "image-to-video requires a source image".into(),
            ));
        }

        let submit = self.submit(request).await?;
        tracing::debug!(request_id = %submit.request_id, model = %self.model, "submitted fal.ai clip request");

        self.poll_until_ready(&submit.request_id, &submit.status_url)
            .await?;

        let video_url = self
            .fetch_result(&submit.response_url, &submit.request_id)
            .await?;
        tracing::debug!(url = %video_url, "fetched fal.ai clip result");

        let data = self.download(&video_url).await?;

        Ok(GeneratedVideo::new(
            data,
            "video/mp4",
            VideoProviderKind::Fal,
            VideoMetadata {
                model: Some(self.model.as_str().to_string()),
                duration_ms: Some(start.elapsed().as_millis() as u64),
                video_duration_secs: Some(request.duration.secs()),
            },
        ))
    }

    fn kind(&self) -> VideoProviderKind {
        VideoProviderKind::Fal
    }

    async fn health_check(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(StoryReelError::Auth("FAL_KEY is empty".into()));
        }
        Ok(())
    }
}

// Request types

#[derive(Debug, Serialize)]
struct FalVideoRequest<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<&'a str>,
    aspect_ratio: &'a str,
    duration: &'a str,
}

// Response types

#[derive(Debug, Deserialize)]
struct FalSubmitResponse {
    request_id: String,
    status_url: String,
    response_url: String,
}

#[derive(Debug, Deserialize)]
struct FalStatusResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct FalVideoResult {
    video: FalVideoData,
}

#[derive(Debug, Deserialize)]
struct FalVideoData {
    url: String,
}

#[derive(Debug, Deserialize)]
struct FalErrorResponse {
    detail: String,
}
