//! Per-scene records.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Speaker used when none could be inferred.
pub const DEFAULT_SPEAKER: &str = "Narrator";

/// Everything known about one scene of a run.
///
/// `index` is the zero-based position that names files and drives every
/// lookup. `scene_number` is a descriptive label taken from the generator's
/// text and may be wrong, duplicated or zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneRecord {
    /// Zero-based position.
    #[serde(rename = "frame_number", alias = "index", default)]
    pub index: usize,
    /// Human label, 1-based when known.
    #[serde(default, deserialize_with = "lenient_number")]
    pub scene_number: u32,
    /// What the frame shows.
    #[serde(default, deserialize_with = "lenient_string")]
    pub visual_description: String,
    /// Narration source. May be empty.
    #[serde(default, deserialize_with = "lenient_string")]
    pub caption: String,
    /// Free-text voice style hint.
    #[serde(default = "default_speaker", deserialize_with = "lenient_speaker")]
    pub speaker: String,
    /// Saved frame for this scene.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,
    /// Narration for this scene.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<PathBuf>,
    /// Animated clip for this scene.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_path: Option<PathBuf>,
}

impl SceneRecord {
    /// Creates a record with no media attached.
    pub fn new(
        index: usize,
        scene_number: u32,
        visual_description: impl Into<String>,
        caption: impl Into<String>,
        speaker: impl Into<String>,
    ) -> Self {
        Self {
            index,
            scene_number,
            visual_description: visual_description.into(),
            caption: caption.into(),
            speaker: speaker.into(),
            image_path: None,
            audio_path: None,
            video_path: None,
        }
    }

    /// Stand-in record for a frame that has no extracted scene.
    pub fn placeholder(index: usize) -> Self {
        let label = format!("Scene {}", index + 1);
        Self::new(
            index,
            (index + 1) as u32,
            label.clone(),
            label,
            DEFAULT_SPEAKER,
        )
    }

    /// True when there is something to narrate.
    pub fn has_caption(&self) -> bool {
        !self.caption.trim().is_empty()
    }
}

fn default_speaker() -> String {
    DEFAULT_SPEAKER.to_string()
}

// LLM output is loosely typed: numbers arrive as strings and strings as null.

fn lenient_number<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u32, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()).unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn lenient_speaker<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    let speaker = lenient_string(d)?;
    if speaker.trim().is_empty() {
        Ok(default_speaker())
    } else {
        Ok(speaker)
    }
}
