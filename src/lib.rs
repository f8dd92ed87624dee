#![warn(missing_docs)]
//! StoryReel - narrated ad-style videos from a single prompt.
//!
//! A run asks a multimodal model for a sequence of frames with captions,
//! turns the captions into per-scene narration, optionally animates each
//! frame, and assembles everything into a GIF and a video.
//!
//! # Quick Start
//!
//! ```no_run
//! use storyreel::{Config, RunRequest, Studio};
//!
//! #[tokio::main]
//! async fn main() -> storyreel::Result<()> {
//!     let config = Config::from_env()?;
//!     let studio = Studio::from_config(&config, None)?.build()?;
//!     let summary = studio.generate(RunRequest::default()).await?;
//!     println!("run saved to {}", summary.run_dir.display());
//!     Ok(())
//! }
//! ```
//!
//! # Resuming
//!
//! Any run directory, including one holding nothing but `frame_NNN.png`
//! files, can be resumed to redo narration, animation and composition:
//!
//! ```no_run
//! use storyreel::{Config, ResumeOverrides, Studio};
//!
//! # async fn run() -> storyreel::Result<()> {
//! let config = Config::from_env()?;
//! let studio = Studio::from_config(&config, None)?.build()?;
//! studio
//!     .resume("outputs/run_20250314_092653".as_ref(), ResumeOverrides::default())
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Collaborators
//!
//! - [`image`]: frame generation (Gemini)
//! - [`text`]: scene extraction and animation prompts (Gemini)
//! - [`speech`]: narration (ElevenLabs)
//! - [`video`]: per-scene animation (fal.ai)
//! - [`media`]: local composition (`ffmpeg`, `ffprobe`, `yt-dlp`) and GIFs

pub mod config;
mod error;
pub mod image;
pub mod media;
pub mod pipeline;
pub mod speech;
pub mod text;
pub mod video;

#[cfg(test)]
mod testing;

// Re-export error types at crate root
pub use config::Config;
pub use error::{Result, StoryReelError};

pub use image::{
    GeneratedImage, GenerationRequest, GenerationResponse, ImageFormat, ImageProvider,
    ImageProviderKind,
};
pub use image::providers::{GeminiModel, GeminiProvider, GeminiProviderBuilder};

pub use text::providers::{GeminiTextModel, GeminiTextProvider, GeminiTextProviderBuilder};
pub use text::{TextProvider, TextProviderKind};

pub use speech::providers::{
    ElevenLabsModel, ElevenLabsProvider, ElevenLabsProviderBuilder, DEFAULT_VOICE_ID,
};
pub use speech::{
    GeneratedAudio, SpeechProvider, SpeechProviderExt, SpeechProviderKind, SpeechRequest,
    VoiceSettings,
};

pub use video::providers::{FalVideoModel, FalVideoProvider, FalVideoProviderBuilder};
pub use video::{
    ClipDuration, GeneratedVideo, VideoGenerationRequest, VideoMetadata, VideoProvider,
    VideoProviderExt, VideoProviderKind,
};

pub use media::{Compositor, FfmpegCompositor, MusicDownloader, MusicFetcher, MusicSource, MusicVolume};

pub use pipeline::{
    AcceptanceThreshold, AcquisitionObserver, AcquisitionPolicy, BatchReport, ResumeOverrides,
    RunLayout, RunRequest, RunSettings, RunSummary, SceneOutcome, SceneRecord, Studio,
    StudioBuilder,
};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Result, StoryReelError};
    pub use crate::image::ImageProvider;
    pub use crate::media::{Compositor, MusicFetcher};
    pub use crate::pipeline::{
        AcquisitionObserver, ResumeOverrides, RunRequest, RunSummary, SceneRecord, Studio,
    };
    pub use crate::speech::{SpeechProvider, SpeechProviderExt};
    pub use crate::text::TextProvider;
    pub use crate::video::{VideoProvider, VideoProviderExt};
}
