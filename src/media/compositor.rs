//! Compositor trait.

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Clip retiming: stretch or squeeze a clip of `from` seconds to `to` seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Retime {
    /// Current clip length in seconds.
    pub from: f64,
    /// Desired length in seconds.
    pub to: f64,
}

impl Retime {
    /// Presentation timestamp multiplier (`setpts` factor).
    pub fn factor(&self) -> f64 {
        if self.from <= 0.0 {
            1.0
        } else {
            self.to / self.from
        }
    }
}

/// Black-box media operations invoked with file paths and timings.
///
/// Every rendered segment carries an audio track (silence when there is no
/// narration) so segments can be concatenated without re-encoding.
#[async_trait]
pub trait Compositor: Send + Sync {
    /// Returns the duration of an audio or video file in seconds.
    async fn probe_duration(&self, path: &Path) -> Result<f64>;

    /// Renders a still frame held for `duration` seconds, with optional narration.
    async fn render_still(
        &self,
        image: &Path,
        narration: Option<&Path>,
        duration: f64,
        output: &Path,
    ) -> Result<()>;

    /// Renders an animated clip, optionally retimed, with optional narration.
    async fn render_clip(
        &self,
        clip: &Path,
        narration: Option<&Path>,
        retime: Option<Retime>,
        output: &Path,
    ) -> Result<()>;

    /// Concatenates segments in order.
    async fn concat(&self, segments: &[&Path], output: &Path) -> Result<()>;

    /// Trims music to `duration` seconds and scales its volume.
    async fn prepare_music(
        &self,
        music: &Path,
        duration: f64,
        volume: f32,
        output: &Path,
    ) -> Result<()>;

    /// Mixes a prepared music bed additively under the video's audio.
    async fn mix_music(&self, video: &Path, music: &Path, output: &Path) -> Result<()>;
}
