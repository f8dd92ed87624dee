//! Frame generation module.

mod provider;
pub mod providers;
mod types;

pub use provider::ImageProvider;
pub use types::{
    image_data_url, GeneratedImage, GenerationMetadata, GenerationRequest, GenerationResponse,
    ImageFormat, ImageProviderKind,
};
