//! Gemini (Google) frame generation provider.
//!
//! Requests both `TEXT` and `IMAGE` response modalities so one call yields
//! the frames and the scene descriptions that go with them.

use crate::config::GEMINI_API_KEY;
use crate::error::{parse_retry_after, sanitize_error_message, Result, StoryReelError};
use crate::image::provider::ImageProvider;
use crate::image::types::{
    GeneratedImage, GenerationMetadata, GenerationRequest, GenerationResponse, ImageFormat,
    ImageProviderKind,
};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Instant;

pub(crate) const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Harm categories relaxed to `BLOCK_ONLY_HIGH` so comedic ad content passes.
const RELAXED_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Gemini multimodal model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeminiModel {
    /// Gemini 2.0 Flash experimental (interleaved text and images).
    #[default]
    Flash2Exp,
    /// Gemini 2.5 Flash Image.
    Flash25Image,
}

impl GeminiModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flash2Exp => "gemini-2.0-flash-exp",
            Self::Flash25Image => "gemini-2.5-flash-image",
        }
    }
}

/// Builder for GeminiProvider.
#[derive(Debug, Clone, Default)]
pub struct GeminiProviderBuilder {
    api_key: Option<String>,
    model: GeminiModel,
}

impl GeminiProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `GEMINI_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the Gemini model variant.
    pub fn model(mut self, model: GeminiModel) -> Self {
        self.model = model;
        self
    }

    /// Builds the provider, resolving the API key.
    pub fn build(self) -> Result<GeminiProvider> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var(GEMINI_API_KEY).ok())
            .ok_or_else(|| {
                StoryReelError::Auth("GEMINI_API_KEY not set and no API key provided".into())
            })?;

        Ok(GeminiProvider {
            client: reqwest::Client::new(),
            api_key,
            model: self.model,
        })
    }
}

/// Gemini frame generation provider.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: GeminiModel,
}

impl GeminiProvider {
    /// Creates a new `GeminiProviderBuilder`.
    pub fn builder() -> GeminiProviderBuilder {
        GeminiProviderBuilder::new()
    }

    async fn generate_impl(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let start = Instant::now();
        let url = format!("{}/models/{}:generateContent", API_BASE, self.model.as_str());
        let body = GeminiRequest::from_generation_request(request);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(parse_gemini_error(status.as_u16(), &text, &headers));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        let parts = gemini_response.into_parts()?;

        let mut texts = Vec::new();
        let mut images = Vec::new();
        for part in parts {
            if let Some(text) = part.text {
                texts.push(text);
            } else if let Some(inline) = part.inline_data {
                let data = base64::engine::general_purpose::STANDARD
                    .decode(&inline.data)
                    .map_err(|e| StoryReelError::Decode(e.to_string()))?;
                let format = ImageFormat::from_mime_type(&inline.mime_type)
                    .or_else(|| ImageFormat::from_magic_bytes(&data))
                    .unwrap_or_default();
                images.push(GeneratedImage::new(data, format));
            }
        }

        tracing::debug!(
            model = self.model.as_str(),
            texts = texts.len(),
            frames = images.len(),
            "gemini generation returned"
        );

        Ok(GenerationResponse {
            texts,
            images,
            metadata: GenerationMetadata {
                model: Some(self.model.as_str().to_string()),
                duration_ms: Some(start.elapsed().as_millis() as u64),
            },
        })
    }
}

#[async_trait]
impl ImageProvider for GeminiProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        self.generate_impl(request).await
    }

    fn kind(&self) -> ImageProviderKind {
        ImageProviderKind::Gemini
    }

    async fn health_check(&self) -> Result<()> {
        gemini_health_check(&self.client, &self.api_key, self.model.as_str()).await
    }
}

/// Maps a failed Gemini HTTP response to an error.
pub(crate) fn parse_gemini_error(
    status: u16,
    text: &str,
    headers: &reqwest::header::HeaderMap,
) -> StoryReelError {
    let text = sanitize_error_message(text);
    if status == 402 {
        return StoryReelError::Billing(
            "Gemini billing issue: enable billing at https://aistudio.google.com".into(),
        );
    }
    if status == 404 {
        return StoryReelError::InvalidRequest(
            "Model not found. Verify the model name is correct.".into(),
        );
    }
    if status == 429 {
        let retry_after = parse_retry_after(headers).map(std::time::Duration::from_secs);
        return StoryReelError::RateLimited { retry_after };
    }
    if status == 401 || status == 403 {
        return StoryReelError::Auth(text);
    }
    let lower = text.to_lowercase();
    if lower.contains("safety") || lower.contains("blocked") || lower.contains("prohibited") {
        return StoryReelError::ContentBlocked(text);
    }
    StoryReelError::Api {
        status,
        message: text,
    }
}

pub(crate) async fn gemini_health_check(
    client: &reqwest::Client,
    api_key: &str,
    model: &str,
) -> Result<()> {
    let url = format!("{}/models/{}", API_BASE, model);
    let response = client
        .get(&url)
        .header("x-goog-api-key", api_key)
        .send()
        .await?;

    match response.status().as_u16() {
        401 | 403 => Err(StoryReelError::Auth("Invalid API key".into())),
        404 => Err(StoryReelError::InvalidRequest(
            "Model not found. Verify the model name is correct.".into(),
        )),
        s if !(200..300).contains(&s) => Err(StoryReelError::Api {
            status: s,
            message: "Health check failed".into(),
        }),
        _ => Ok(()),
    }
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiRequest {
    pub(crate) contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) safety_settings: Vec<SafetySetting>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) generation_config: Option<GeminiConfig>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GeminiContent {
    pub(crate) parts: Vec<GeminiRequestPart>,
}

/// A part in a Gemini request - can be text or inline image data.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum GeminiRequestPart {
    Text { text: String },
    InlineData { inline_data: GeminiInlineData },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiConfig {
    response_modalities: Vec<String>,
}

impl GeminiRequest {
    fn from_generation_request(req: &GenerationRequest) -> Self {
        let mut parts = Vec::new();

        // Seed image goes first so the prompt can refer to it
        if let Some(ref image_data) = req.seed_image {
            let mime_type = ImageFormat::from_magic_bytes(image_data)
                .map(|f| f.mime_type())
                .unwrap_or("image/jpeg")
                .to_string();

            parts.push(GeminiRequestPart::InlineData {
                inline_data: GeminiInlineData {
                    mime_type,
                    data: base64::engine::general_purpose::STANDARD.encode(image_data),
                },
            });
        }

        parts.push(GeminiRequestPart::Text {
            text: req.prompt.clone(),
        });

        Self {
            contents: vec![GeminiContent { parts }],
            safety_settings: RELAXED_CATEGORIES
                .iter()
                .map(|category| SafetySetting {
                    category,
                    threshold: "BLOCK_ONLY_HIGH",
                })
                .collect(),
            generation_config: Some(GeminiConfig {
                response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
            }),
        }
    }

    /// Plain text prompt with default safety and modalities.
    pub(crate) fn text(prompt: &str) -> Self {
        Self {
            contents: vec![GeminiContent {
                parts: vec![GeminiRequestPart::Text {
                    text: prompt.to_string(),
                }],
            }],
            safety_settings: Vec::new(),
            generation_config: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

impl GeminiResponse {
    /// Returns the parts of the first candidate, mapping blocks to errors.
    pub(crate) fn into_parts(self) -> Result<Vec<GeminiPartResponse>> {
        // Blocks come back as HTTP 200 with prompt feedback
        if let Some(feedback) = self.prompt_feedback {
            if let Some(reason) = feedback.block_reason {
                let msg = feedback
                    .block_reason_message
                    .unwrap_or_else(|| format!("Prompt blocked: {}", reason));
                return Err(StoryReelError::ContentBlocked(msg));
            }
        }

        let candidate = self.candidates.into_iter().next().ok_or_else(|| {
            StoryReelError::UnexpectedResponse("No candidates in Gemini response".into())
        })?;

        if let Some(ref finish_reason) = candidate.finish_reason {
            match finish_reason.as_str() {
                "SAFETY" | "IMAGE_SAFETY" | "RECITATION" | "PROHIBITED_CONTENT" | "BLOCKLIST" => {
                    return Err(StoryReelError::ContentBlocked(format!(
                        "Content blocked by Gemini safety filter: {}",
                        finish_reason
                    )));
                }
                _ => {} // STOP, MAX_TOKENS, etc. are normal
            }
        }

        Ok(candidate.content.map(|c| c.parts).unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiPartResponse {
    #[serde(default)]
    pub(crate) text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_model_as_str() {
        assert_eq!(GeminiModel::Flash2Exp.as_str(), "gemini-2.0-flash-exp");
        assert_eq!(GeminiModel::Flash25Image.as_str(), "gemini-2.5-flash-image");
        assert_eq!(GeminiModel::default(), GeminiModel::Flash2Exp);
    }

    #[test]
    fn test_builder_with_explicit_key() {
        let provider = GeminiProviderBuilder::new()
            .api_key("test-key")
            .model(GeminiModel::Flash25Image)
            .build();
        assert!(provider.is_ok());
    }

    #[test]
    fn test_request_asks_for_text_and_images() {
        let req = GenerationRequest::new("Five frames of a mushroom ad");
        let json = serde_json::to_value(GeminiRequest::from_generation_request(&req)).unwrap();

        assert_eq!(
            json["generationConfig"]["responseModalities"],
            serde_json::json!(["TEXT", "IMAGE"])
        );
        assert_eq!(json["safetySettings"].as_array().unwrap().len(), 4);
        assert_eq!(json["safetySettings"][0]["threshold"], "BLOCK_ONLY_HIGH");
        assert_eq!(json["contents"][0]["parts"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_request_puts_seed_image_first() {
        let png = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        let req = GenerationRequest::new("Keep this style").with_seed_image(png);
        let json = serde_json::to_value(GeminiRequest::from_generation_request(&req)).unwrap();

        let parts = json["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["inline_data"]["mimeType"], "image/png");
        assert_eq!(parts[1]["text"], "Keep this style");
    }

    #[test]
    fn test_text_request_omits_generation_config() {
        let json = serde_json::to_value(GeminiRequest::text("hello")).unwrap();
        assert!(json.get("generationConfig").is_none());
        assert!(json.get("safetySettings").is_none());
    }

    #[test]
    fn test_response_interleaves_text_and_images() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "SCENE 1: A mushroom in a suit."},
                        {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}},
                        {"text": "SCENE 2: The mushroom waves."},
                        {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}}
                    ]
                },
                "finishReason": "STOP"
            }]
        }"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        let parts = resp.into_parts().unwrap();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts.iter().filter(|p| p.text.is_some()).count(), 2);
        assert_eq!(parts.iter().filter(|p| p.inline_data.is_some()).count(), 2);
    }

    #[test]
    fn test_response_with_prompt_feedback_block() {
        let json = r#"{
            "candidates": [],
            "promptFeedback": {
                "blockReason": "SAFETY",
                "blockReasonMessage": "Prompt was blocked due to safety"
            }
        }"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        let err = resp.into_parts().unwrap_err();
        assert!(matches!(err, StoryReelError::ContentBlocked(m) if m.contains("safety")));
    }

    #[test]
    fn test_response_safety_finish_reason() {
        let json = r#"{"candidates": [{"finishReason": "IMAGE_SAFETY"}]}"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(
            resp.into_parts(),
            Err(StoryReelError::ContentBlocked(_))
        ));
    }

    #[test]
    fn test_response_without_candidates() {
        let resp: GeminiResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(matches!(
            resp.into_parts(),
            Err(StoryReelError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_parse_error_mapping() {
        let headers = reqwest::header::HeaderMap::new();
        assert!(matches!(
            parse_gemini_error(401, "nope", &headers),
            StoryReelError::Auth(_)
        ));
        assert!(matches!(
            parse_gemini_error(429, "slow down", &headers),
            StoryReelError::RateLimited { retry_after: None }
        ));
        assert!(matches!(
            parse_gemini_error(400, "request blocked by safety", &headers),
            StoryReelError::ContentBlocked(_)
        ));
        assert!(matches!(
            parse_gemini_error(500, "boom", &headers),
            StoryReelError::Api { status: 500, .. }
        ));
    }
}
