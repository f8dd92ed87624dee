//! Per-scene narration.
//!
//! Audio for record `i` always lands at `audio/frame_{i:03}_audio.mp3`.
//! Synthesis runs with bounded concurrency and results are stitched back by
//! index. A repair pass then retries, once each, every scene whose file is
//! still missing. When both passes write a file the repair pass wins.

use crate::error::Result;
use crate::pipeline::layout::RunLayout;
use crate::pipeline::report::{BatchReport, FailureReason, SceneOutcome, SkipReason};
use crate::pipeline::scene::SceneRecord;
use crate::speech::providers::DEFAULT_VOICE_ID;
use crate::speech::{SpeechProvider, SpeechProviderExt, SpeechRequest, VoiceSettings};
use regex::Regex;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tokio::sync::Semaphore;

static HASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\w+").expect("valid hashtag pattern"));
static MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[*_~`#\[\]<>]").expect("valid markup pattern"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Removes hashtags and Markdown markup so the text reads naturally aloud.
pub fn sanitize_caption(caption: &str) -> String {
    let text = HASHTAG.replace_all(caption, "");
    let text = MARKUP.replace_all(&text, "");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// Knobs for [`synthesize_all`].
#[derive(Debug, Clone)]
pub struct NarrationOptions {
    /// Provider voice.
    pub voice_id: String,
    /// Scenes synthesized at once.
    pub concurrency: usize,
    /// Retries on transient errors in the main pass.
    pub max_retries: u32,
}

impl Default for NarrationOptions {
    fn default() -> Self {
        Self {
            voice_id: DEFAULT_VOICE_ID.to_string(),
            concurrency: 3,
            max_retries: 2,
        }
    }
}

impl NarrationOptions {
    /// Default options with a different voice.
    pub fn with_voice(voice_id: impl Into<String>) -> Self {
        Self {
            voice_id: voice_id.into(),
            ..Self::default()
        }
    }
}

/// Narrates every scene with a usable caption.
///
/// Records are re-indexed by position and their audio paths rebuilt from
/// scratch: existing `.mp3` files in the audio directory are removed first.
/// Individual failures are reported, never returned.
pub async fn synthesize_all(
    provider: Arc<dyn SpeechProvider>,
    mut scenes: Vec<SceneRecord>,
    layout: &RunLayout,
    options: &NarrationOptions,
) -> Result<(Vec<SceneRecord>, BatchReport<PathBuf>)> {
    for (i, scene) in scenes.iter_mut().enumerate() {
        scene.index = i;
        scene.audio_path = None;
    }
    clear_audio_dir(&layout.audio_dir())?;
    write_captions(&layout.captions_path(), &scenes)?;

    let mut report = BatchReport::new();
    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let mut handles = Vec::with_capacity(scenes.len());

    for scene in &scenes {
        let text = sanitize_caption(&scene.caption);
        if text.is_empty() {
            tracing::info!(index = scene.index, "no caption, skipping narration");
            report.record(scene.index, SceneOutcome::Skipped(SkipReason::EmptyCaption));
            continue;
        }

        let request = SpeechRequest::new(
            text,
            options.voice_id.clone(),
            VoiceSettings::for_speaker(&scene.speaker),
        );
        let output = layout.audio_path(scene.index);
        let provider = Arc::clone(&provider);
        let sem = Arc::clone(&semaphore);
        let max_retries = options.max_retries;

        let handle = tokio::spawn(async move {
            let _permit = sem
                .acquire()
                .await
                .map_err(|_| FailureReason::Aborted("semaphore closed".into()))?;
            let audio = provider
                .synthesize_with_retries(&request, max_retries)
                .await?;
            audio.save(&output)?;
            Ok::<_, FailureReason>(output)
        });
        handles.push((scene.index, handle));
    }

    for (index, handle) in handles {
        let outcome = match handle.await {
            Ok(Ok(path)) => {
                tracing::info!(index, path = %path.display(), "narration saved");
                scenes[index].audio_path = Some(path.clone());
                SceneOutcome::Produced(path)
            }
            Ok(Err(reason)) => {
                tracing::warn!(index, error = %reason, "narration failed");
                SceneOutcome::Failed(reason)
            }
            Err(e) => {
                tracing::error!(index, error = %e, "narration task failed");
                SceneOutcome::Failed(FailureReason::Aborted(e.to_string()))
            }
        };
        report.record(index, outcome);
    }

    repair_missing(provider.as_ref(), &mut scenes, layout, options, &mut report).await;
    Ok((scenes, report))
}

/// One plain attempt for each narratable scene whose file is missing.
async fn repair_missing(
    provider: &dyn SpeechProvider,
    scenes: &mut [SceneRecord],
    layout: &RunLayout,
    options: &NarrationOptions,
    report: &mut BatchReport<PathBuf>,
) {
    let mut still_missing = Vec::new();

    for i in 0..scenes.len() {
        let expected = layout.audio_path(i);
        if expected.is_file() {
            continue;
        }
        let Some(scene) = scenes.iter_mut().find(|s| s.index == i) else {
            continue;
        };
        let text = sanitize_caption(&scene.caption);
        if text.is_empty() {
            continue;
        }

        tracing::info!(index = i, "regenerating missing narration");
        let request = SpeechRequest::new(
            text,
            options.voice_id.clone(),
            VoiceSettings::for_speaker(&scene.speaker),
        );
        let result = match provider.synthesize(&request).await {
            Ok(audio) => audio.save(&expected),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                scene.audio_path = Some(expected.clone());
                report.record(i, SceneOutcome::Produced(expected));
            }
            Err(e) => {
                tracing::warn!(index = i, error = %e, "narration repair failed");
                report.record(i, SceneOutcome::Failed(e.into()));
                still_missing.push(i);
            }
        }
    }

    if !still_missing.is_empty() {
        tracing::warn!(indices = ?still_missing, "scenes still missing narration");
    }
}

fn clear_audio_dir(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        std::fs::create_dir_all(dir)?;
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "mp3") {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}

fn write_captions(path: &Path, scenes: &[SceneRecord]) -> Result<()> {
    let mut doc = String::from("# Scene Captions\n\n");
    for scene in scenes {
        let _ = writeln!(doc, "## Scene {}", scene.index + 1);
        if scene.has_caption() {
            let _ = write!(
                doc,
                "**Speaker:** {}\n\n**Original:** {}\n\n**Cleaned:** {}\n\n",
                scene.speaker,
                scene.caption,
                sanitize_caption(&scene.caption)
            );
        } else {
            doc.push_str("*No caption available*\n\n");
        }
    }
    std::fs::write(path, doc)?;
    Ok(())
}
