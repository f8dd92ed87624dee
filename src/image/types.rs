//! Core types for frame generation.

use crate::error::Result;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format.
    WebP,
}

impl ImageFormat {
    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Maps a MIME type reported by a provider to a format.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// Image provider kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageProviderKind {
    /// Google Gemini multimodal models.
    Gemini,
}

impl std::fmt::Display for ImageProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
        }
    }
}

/// A request for a sequence of frames plus their accompanying text.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// The full prompt sent to the model.
    pub prompt: String,
    /// Optional style reference sent ahead of the prompt (raw bytes).
    pub seed_image: Option<Vec<u8>>,
}

impl GenerationRequest {
    /// Creates a new request with the given prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            seed_image: None,
        }
    }

    /// Attaches a seed image used as a visual starting point.
    pub fn with_seed_image(mut self, image: Vec<u8>) -> Self {
        self.seed_image = Some(image);
        self
    }
}

/// Metadata about one generation call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationMetadata {
    /// Model used for generation.
    pub model: Option<String>,
    /// Round-trip duration in milliseconds.
    pub duration_ms: Option<u64>,
}

/// One image part returned by the generator.
#[derive(Debug, Clone)]
#[must_use = "generated image should be saved or processed"]
pub struct GeneratedImage {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// Image format as reported or detected.
    pub format: ImageFormat,
}

impl GeneratedImage {
    /// Creates a new generated image.
    pub fn new(data: Vec<u8>, format: ImageFormat) -> Self {
        Self { data, format }
    }

    /// Decodes the image and writes it to `path` as PNG.
    ///
    /// Frames on disk are always PNG regardless of what the provider sent,
    /// so the `frame_NNN.png` naming holds.
    /// PNG data is decoded as a check and then written unchanged.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        let decoded = image::load_from_memory(&self.data)?;
        if ImageFormat::from_magic_bytes(&self.data) == Some(ImageFormat::Png) {
            std::fs::write(path, &self.data)?;
        } else {
            decoded.save_with_format(path, image::ImageFormat::Png)?;
        }
        Ok(())
    }
}

/// The ordered parts of one generation response, split by kind.
#[derive(Debug, Clone, Default)]
pub struct GenerationResponse {
    /// Text parts in response order.
    pub texts: Vec<String>,
    /// Image parts in response order.
    pub images: Vec<GeneratedImage>,
    /// Generation metadata.
    pub metadata: GenerationMetadata,
}

impl GenerationResponse {
    /// Number of image parts, i.e. frames.
    pub fn frame_count(&self) -> usize {
        self.images.len()
    }
}

/// Encodes raw image bytes as a `data:` URL, sniffing the MIME type.
pub fn image_data_url(data: &[u8]) -> String {
    let mime = ImageFormat::from_magic_bytes(data)
        .map(|f| f.mime_type())
        .unwrap_or("image/jpeg");
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(data)
    )
}
