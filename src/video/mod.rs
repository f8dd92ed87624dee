//! Per-scene animation (image-to-video) module.

mod provider;
pub mod providers;
mod types;

pub use provider::{VideoProvider, VideoProviderExt};
pub use types::{
    ClipDuration, GeneratedVideo, VideoGenerationRequest, VideoMetadata, VideoProviderKind,
};
