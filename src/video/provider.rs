//! Video provider trait and utilities.

use crate::error::Result;
use crate::video::types::{GeneratedVideo, VideoGenerationRequest, VideoProviderKind};
use async_trait::async_trait;

/// Trait for image-to-video providers.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Generates a clip from the given request.
    async fn generate(&self, request: &VideoGenerationRequest) -> Result<GeneratedVideo>;

    /// Returns the kind of this provider.
    fn kind(&self) -> VideoProviderKind;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str {
        match self.kind() {
            VideoProviderKind::Fal => "fal.ai",
        }
    }

    /// Checks if the provider is reachable and authenticated.
    async fn health_check(&self) -> Result<()>;
}

/// Extension trait for providers with retry logic.
#[async_trait]
pub trait VideoProviderExt: VideoProvider {
    /// Generates with automatic retries on transient failures.
    async fn generate_with_retries(
        &self,
        request: &VideoGenerationRequest,
        max_retries: u32,
    ) -> Result<GeneratedVideo> {
        let mut attempt = 0;
        loop {
            match self.generate(request).await {
                Ok(video) => return Ok(video),
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    let delay = e.retry_after().unwrap_or(std::time::Duration::from_secs(1));
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        max_retries,
                        delay_ms = delay.as_millis(),
                        "retrying after transient error: {e}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl<T: VideoProvider + ?Sized> VideoProviderExt for T {}
