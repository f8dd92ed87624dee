//! Speech provider trait and utilities.

use crate::error::{Result, StoryReelError};
use crate::speech::types::{GeneratedAudio, SpeechProviderKind, SpeechRequest};
use async_trait::async_trait;

/// Trait for text-to-speech providers.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Synthesizes the request text into audio.
    async fn synthesize(&self, request: &SpeechRequest) -> Result<GeneratedAudio>;

    /// Returns the kind of this provider.
    fn kind(&self) -> SpeechProviderKind;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str {
        match self.kind() {
            SpeechProviderKind::ElevenLabs => "ElevenLabs",
        }
    }

    /// Checks if the provider is reachable and authenticated.
    async fn health_check(&self) -> Result<()>;
}

/// Extension trait for providers with retry logic.
#[async_trait]
pub trait SpeechProviderExt: SpeechProvider {
    /// Synthesizes with automatic retries on transient failures.
    async fn synthesize_with_retries(
        &self,
        request: &SpeechRequest,
        max_retries: u32,
    ) -> Result<GeneratedAudio> {
        let mut attempt = 0;
        loop {
            match self.synthesize(request).await {
                Ok(audio) => return Ok(audio),
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    let delay = e.retry_after().unwrap_or(std::time::Duration::from_secs(1));
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        max_retries,
                        delay_ms = delay.as_millis(),
                        "retrying speech after transient error: {e}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl<T: SpeechProvider + ?Sized> SpeechProviderExt for T {}

/// Rejects requests with nothing to say.
pub(crate) fn ensure_text(request: &SpeechRequest) -> Result<()> {
    if request.text.trim().is_empty() {
        return Err(StoryReelError::InvalidRequest("empty narration text".into()));
    }
    Ok(())
}
