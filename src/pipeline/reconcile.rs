//! Aligning scene records with frame files.
//!
//! Position wins over any numbering the generator printed: record `i` gets
//! frame `i`. Missing records become placeholders; surplus records are kept
//! without a frame.

use crate::error::{Result, StoryReelError};
use crate::pipeline::layout::RunLayout;
use crate::pipeline::scene::SceneRecord;
use std::path::PathBuf;

/// Merges `scenes` with `frames` by position.
///
/// The result has `max(scenes.len(), frames.len())` records indexed
/// `0..n`. Record `i` points at `frames[i]` when that frame exists and has
/// no image otherwise.
pub fn reconcile(scenes: Vec<SceneRecord>, frames: &[PathBuf]) -> Vec<SceneRecord> {
    let total = scenes.len().max(frames.len());
    if scenes.len() < frames.len() {
        tracing::warn!(
            scenes = scenes.len(),
            frames = frames.len(),
            "fewer scenes than frames, adding placeholders"
        );
    } else if scenes.len() > frames.len() {
        tracing::warn!(
            scenes = scenes.len(),
            frames = frames.len(),
            "more scenes than frames, trailing scenes have no image"
        );
    }

    let mut scenes = scenes.into_iter();
    (0..total)
        .map(|i| {
            let mut record = scenes.next().unwrap_or_else(|| SceneRecord::placeholder(i));
            record.index = i;
            record.image_path = frames.get(i).cloned();
            record
        })
        .collect()
}

/// Rebuilds records for an existing run from what is on disk.
///
/// Frames are rediscovered and reconciled with the saved records. Stored
/// media paths survive only if the file still exists, and the file named
/// for the record's index is adopted whenever it exists.
pub fn reconstruct(layout: &RunLayout) -> Result<Vec<SceneRecord>> {
    let frames = layout.discover_frames()?;
    let saved = layout.load_scenes()?.unwrap_or_default();
    if frames.is_empty() && saved.is_empty() {
        return Err(StoryReelError::NotARun(layout.root().to_path_buf()));
    }
    tracing::info!(
        frames = frames.len(),
        scenes = saved.len(),
        "reconstructing run from disk"
    );

    let mut records = reconcile(saved, &frames);
    for record in &mut records {
        record.audio_path = existing_or_adopted(record.audio_path.take(), layout.audio_path(record.index));
        record.video_path = existing_or_adopted(record.video_path.take(), layout.clip_path(record.index));
    }
    Ok(records)
}

fn existing_or_adopted(stored: Option<PathBuf>, expected: PathBuf) -> Option<PathBuf> {
    if expected.is_file() {
        return Some(expected);
    }
    stored.filter(|p| p.is_file())
}
