//! Final assembly: one segment per frame or clip, then music.
//!
//! Each segment lasts as long as its scene's narration, or a fixed fallback
//! when there is none. Animated clips are retimed to the narration when the
//! lengths disagree. A segment that cannot be rendered is retried silent and
//! then dropped; only an empty result is an error.

use crate::error::{Result, StoryReelError};
use crate::media::{
    write_gif, Compositor, MusicFetcher, MusicSource, MusicVolume, Retime, GIF_FRAME_DELAY,
};
use crate::pipeline::scene::SceneRecord;
use std::path::{Path, PathBuf};

/// What the composed inputs are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// Still frames held for the segment duration.
    Still,
    /// Animated clips.
    Clip,
}

/// Knobs for [`compose`].
#[derive(Debug, Clone)]
pub struct CompositionOptions {
    /// Background music, if any.
    pub music: Option<MusicSource>,
    /// Music level relative to narration.
    pub music_volume: MusicVolume,
    /// Segment length in seconds when a scene has no usable narration.
    pub fallback_duration: f64,
    /// Clips within this many seconds of the narration are left alone.
    pub retime_tolerance: f64,
}

impl Default for CompositionOptions {
    fn default() -> Self {
        Self {
            music: None,
            music_volume: MusicVolume::DEFAULT,
            fallback_duration: 3.0,
            retime_tolerance: 0.1,
        }
    }
}

/// Composes `inputs` into `output`, in list order.
///
/// The scene for each input is the one whose `image_path` (stills) or
/// `video_path` (clips) equals it, or else the scene at the same position.
pub async fn compose(
    compositor: &dyn Compositor,
    fetcher: &dyn MusicFetcher,
    inputs: &[PathBuf],
    kind: SegmentKind,
    scenes: &[SceneRecord],
    output: &Path,
    options: &CompositionOptions,
) -> Result<PathBuf> {
    if inputs.is_empty() {
        return Err(StoryReelError::NoFrames);
    }

    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let work = tempfile::Builder::new()
        .prefix(".storyreel-compose")
        .tempdir_in(parent)?;

    let mut segments = Vec::with_capacity(inputs.len());
    for (position, input) in inputs.iter().enumerate() {
        let scene = find_scene(scenes, input, kind, position);
        let segment = work.path().join(format!("segment_{position:03}.mp4"));
        if render_segment(compositor, input, scene, kind, &segment, options).await {
            segments.push(segment);
        }
    }

    if segments.is_empty() {
        tracing::error!(inputs = inputs.len(), "no segment could be rendered");
        return Err(StoryReelError::NoFrames);
    }
    if segments.len() < inputs.len() {
        tracing::warn!(
            rendered = segments.len(),
            inputs = inputs.len(),
            "some segments were dropped"
        );
    }

    let refs: Vec<&Path> = segments.iter().map(PathBuf::as_path).collect();
    let Some(music) = &options.music else {
        compositor.concat(&refs, output).await?;
        tracing::info!(path = %output.display(), segments = refs.len(), "composed video");
        return Ok(output.to_path_buf());
    };

    let joined = work.path().join("joined.mp4");
    compositor.concat(&refs, &joined).await?;
    match add_music(compositor, fetcher, music, &joined, work.path(), output, options).await {
        Ok(()) => {
            tracing::info!(path = %output.display(), "composed video with music");
        }
        Err(e) => {
            tracing::warn!(error = %e, "background music dropped");
            tokio::fs::rename(&joined, output).await?;
        }
    }
    Ok(output.to_path_buf())
}

/// Writes the run GIF on the blocking pool.
pub async fn compose_gif(frames: Vec<PathBuf>, output: PathBuf) -> Result<usize> {
    tokio::task::spawn_blocking(move || write_gif(&frames, &output, GIF_FRAME_DELAY))
        .await
        .map_err(|e| StoryReelError::Media(format!("GIF task failed: {e}")))?
}

fn find_scene<'a>(
    scenes: &'a [SceneRecord],
    input: &Path,
    kind: SegmentKind,
    position: usize,
) -> Option<&'a SceneRecord> {
    scenes
        .iter()
        .find(|s| {
            let candidate = match kind {
                SegmentKind::Still => s.image_path.as_deref(),
                SegmentKind::Clip => s.video_path.as_deref(),
            };
            candidate == Some(input)
        })
        .or_else(|| scenes.get(position))
}

/// Renders one segment. Returns false when it had to be dropped.
async fn render_segment(
    compositor: &dyn Compositor,
    input: &Path,
    scene: Option<&SceneRecord>,
    kind: SegmentKind,
    segment: &Path,
    options: &CompositionOptions,
) -> bool {
    let narration = scene
        .and_then(|s| s.audio_path.as_deref())
        .filter(|p| p.is_file());

    let narrated = match narration {
        Some(audio) => match compositor.probe_duration(audio).await {
            Ok(secs) if secs > 0.0 => Some((audio, secs)),
            Ok(secs) => {
                tracing::warn!(path = %audio.display(), secs, "narration has no length, using silence");
                None
            }
            Err(e) => {
                tracing::warn!(path = %audio.display(), error = %e, "could not probe narration, using silence");
                None
            }
        },
        None => None,
    };

    let first = render(compositor, input, narrated, kind, segment, options).await;
    let Err(e) = first else {
        return true;
    };

    if narrated.is_none() {
        tracing::error!(input = %input.display(), error = %e, "segment failed, skipping");
        return false;
    }
    tracing::warn!(input = %input.display(), error = %e, "narrated segment failed, retrying silent");
    match render(compositor, input, None, kind, segment, options).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(input = %input.display(), error = %e, "segment failed, skipping");
            false
        }
    }
}

async fn render(
    compositor: &dyn Compositor,
    input: &Path,
    narration: Option<(&Path, f64)>,
    kind: SegmentKind,
    segment: &Path,
    options: &CompositionOptions,
) -> Result<()> {
    match kind {
        SegmentKind::Still => {
            let duration = narration.map_or(options.fallback_duration, |(_, secs)| secs);
            compositor
                .render_still(input, narration.map(|(p, _)| p), duration, segment)
                .await
        }
        SegmentKind::Clip => {
            let retime = match narration {
                Some((_, target)) => clip_retime(compositor, input, target, options).await,
                None => None,
            };
            compositor
                .render_clip(input, narration.map(|(p, _)| p), retime, segment)
                .await
        }
    }
}

async fn clip_retime(
    compositor: &dyn Compositor,
    clip: &Path,
    target: f64,
    options: &CompositionOptions,
) -> Option<Retime> {
    match compositor.probe_duration(clip).await {
        Ok(length) if (length - target).abs() > options.retime_tolerance => {
            tracing::debug!(clip = %clip.display(), length, target, "retiming clip");
            Some(Retime {
                from: length,
                to: target,
            })
        }
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(clip = %clip.display(), error = %e, "could not probe clip, keeping its length");
            None
        }
    }
}

async fn add_music(
    compositor: &dyn Compositor,
    fetcher: &dyn MusicFetcher,
    source: &MusicSource,
    joined: &Path,
    work: &Path,
    output: &Path,
    options: &CompositionOptions,
) -> Result<()> {
    let track = fetcher.fetch(source, work).await?;
    let total = compositor.probe_duration(joined).await?;
    let bed = work.join("music_bed.m4a");
    compositor
        .prepare_music(&track, total, options.music_volume.get(), &bed)
        .await?;
    compositor.mix_music(joined, &bed, output).await
}
