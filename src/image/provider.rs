//! Frame provider trait.

use crate::error::Result;
use crate::image::types::{GenerationRequest, GenerationResponse, ImageProviderKind};
use async_trait::async_trait;

/// Trait for multimodal generators that return frames and text together.
///
/// The number of image parts in a response is not under the caller's
/// control; callers decide whether a response is good enough.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Issues one generation call and returns its parts split by kind.
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse>;

    /// Returns the kind of this provider.
    fn kind(&self) -> ImageProviderKind;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str {
        match self.kind() {
            ImageProviderKind::Gemini => "Gemini (Google)",
        }
    }

    /// Checks if the provider is reachable and authenticated.
    async fn health_check(&self) -> Result<()>;
}
