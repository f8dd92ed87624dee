//! Core types for per-scene animation.

use crate::error::{Result, StoryReelError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Video provider kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoProviderKind {
    /// fal.ai queue API.
    Fal,
}

impl std::fmt::Display for VideoProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fal => write!(f, "fal"),
        }
    }
}

/// Clip length accepted by image-to-video models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClipDuration {
    /// Five seconds.
    #[default]
    #[serde(rename = "5s")]
    Five,
    /// Six seconds.
    #[serde(rename = "6s")]
    Six,
    /// Seven seconds.
    #[serde(rename = "7s")]
    Seven,
    /// Eight seconds.
    #[serde(rename = "8s")]
    Eight,
}

impl ClipDuration {
    /// Returns the wire value, e.g. `"5s"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Five => "5s",
            Self::Six => "6s",
            Self::Seven => "7s",
            Self::Eight => "8s",
        }
    }

    /// Returns the length in seconds.
    pub fn secs(&self) -> u32 {
        match self {
            Self::Five => 5,
            Self::Six => 6,
            Self::Seven => 7,
            Self::Eight => 8,
        }
    }
}

impl FromStr for ClipDuration {
    type Err = StoryReelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().trim_end_matches('s') {
            "5" => Ok(Self::Five),
            "6" => Ok(Self::Six),
            "7" => Ok(Self::Seven),
            "8" => Ok(Self::Eight),
            other => Err(StoryReelError::InvalidRequest(format!(
                "unsupported clip duration: {other}"
            ))),
        }
    }
}

/// Metadata about the video generation process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Model used for generation.
    pub model: Option<String>,
    /// Generation duration in milliseconds.
    pub duration_ms: Option<u64>,
    /// Requested clip length in seconds.
    pub video_duration_secs: Option<u32>,
}

/// A request to animate one frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoGenerationRequest {
    /// Motion prompt.
    pub prompt: String,
    /// Clip length.
    pub duration: ClipDuration,
    /// Aspect ratio (e.g., "16:9").
    pub aspect_ratio: String,
    /// Source frame as an `https://` or `data:` URL.
    pub source_image_url: Option<String>,
}

impl VideoGenerationRequest {
    /// Creates a new request with the given prompt, 5 s at 16:9.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            duration: ClipDuration::default(),
            aspect_ratio: "16:9".to_string(),
            source_image_url: None,
        }
    }

    /// Sets the clip length.
    pub fn with_duration(mut self, duration: ClipDuration) -> Self {
        self.duration = duration;
        self
    }

    /// Sets the aspect ratio.
    pub fn with_aspect_ratio(mut self, ratio: impl Into<String>) -> Self {
        self.aspect_ratio = ratio.into();
        self
    }

    /// Sets the frame to animate.
    pub fn with_source_image(mut self, url: impl Into<String>) -> Self {
        self.source_image_url = Some(url.into());
        self
    }
}

/// A generated video with its data and metadata.
#[derive(Debug, Clone)]
#[must_use = "generated video should be saved"]
pub struct GeneratedVideo {
    /// Raw video bytes.
    pub data: Vec<u8>,
    /// MIME type (e.g., "video/mp4").
    pub mime_type: String,
    /// Provider that generated this video.
    pub provider: VideoProviderKind,
    /// Generation metadata.
    pub metadata: VideoMetadata,
}

impl GeneratedVideo {
    /// Creates a new generated video.
    pub fn new(
        data: Vec<u8>,
        mime_type: impl Into<String>,
        provider: VideoProviderKind,
        metadata: VideoMetadata,
    ) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
            provider,
            metadata,
        }
    }

    /// Returns the size of the video data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Saves the video to the specified path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, &self.data)?;
        Ok(())
    }
}
