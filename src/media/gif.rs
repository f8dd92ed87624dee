//! Animated GIF assembly straight from frame files.

use crate::error::{Result, StoryReelError};
use image::codecs::gif::{GifEncoder, Repeat};
use image::imageops::FilterType;
use image::{Delay, Frame};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

/// Time each frame stays on screen.
pub const GIF_FRAME_DELAY: Duration = Duration::from_millis(500);

/// Writes `frames` to `output` as a GIF that loops forever.
///
/// Frames that differ in size from the first one are resized to match.
/// Undecodable frames are skipped with a warning; if none decode, the
/// result is [`StoryReelError::NoFrames`].
pub fn write_gif(frames: &[impl AsRef<Path>], output: &Path, delay: Duration) -> Result<usize> {
    let delay = Delay::from_saturating_duration(delay);
    let mut size = None;
    let mut encoded = Vec::with_capacity(frames.len());

    for path in frames {
        let path = path.as_ref();
        let img = match image::open(path) {
            Ok(img) => img.to_rgba8(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping undecodable frame");
                continue;
            }
        };
        let (width, height) = *size.get_or_insert(img.dimensions());
        let img = if img.dimensions() == (width, height) {
            img
        } else {
            image::imageops::resize(&img, width, height, FilterType::Triangle)
        };
        encoded.push(Frame::from_parts(img, 0, 0, delay));
    }

    if encoded.is_empty() {
        return Err(StoryReelError::NoFrames);
    }

    let count = encoded.len();
    let mut encoder = GifEncoder::new(BufWriter::new(File::create(output)?));
    encoder.set_repeat(Repeat::Infinite)?;
    encoder.encode_frames(encoded)?;
    tracing::info!(path = %output.display(), frames = count, "wrote GIF");
    Ok(count)
}
