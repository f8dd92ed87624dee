//! Scene extraction from the generator's free-form text.
//!
//! An LLM is asked for a JSON array first. If that yields nothing, each text
//! part is mined with regular expressions instead.

use crate::error::Result;
use crate::pipeline::scene::{SceneRecord, DEFAULT_SPEAKER};
use crate::text::TextProvider;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static SCENE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)SCENE\s+(\d+)").expect("valid scene pattern"));
static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)""#).expect("valid quote pattern"));
static SENTENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z][^.!?]*[.!?]").expect("valid sentence pattern"));

/// Builds the extraction prompt for the joined text.
pub fn build_extraction_prompt(combined_text: &str) -> String {
    format!(
        r#"Below is text describing scenes from a TV ad. For each scene, extract:
1. Scene number
2. Visual description
3. Caption
4. Speaker (infer who would be speaking the caption based on the scene description)

For the speaker field, provide details like gender, age, character type, or emotional state.
Examples: "Character 1 (man, nervous)", "Narrator (female, authoritative)", "Mascot (cheerful)"

Format the output as a JSON array where each object has the structure:
{{
  "scene_number": (integer),
  "visual_description": (string),
  "caption": (string),
  "speaker": (string)
}}

Only include the JSON in your response, nothing else.

TEXT TO PROCESS:
{combined_text}
"#
    )
}

/// Joins the non-empty text parts with blank lines.
pub fn join_text_parts(texts: &[String]) -> String {
    texts
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Removes a surrounding Markdown code fence, if any.
pub fn strip_code_fence(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```") {
        // Drop the language tag on the opening fence
        s = rest
            .strip_prefix("json")
            .or_else(|| rest.strip_prefix("JSON"))
            .unwrap_or(rest);
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// Parses an LLM reply into records indexed by position.
pub fn parse_scene_json(raw: &str) -> Result<Vec<SceneRecord>> {
    let mut scenes: Vec<SceneRecord> = serde_json::from_str(strip_code_fence(raw))?;
    for (i, scene) in scenes.iter_mut().enumerate() {
        scene.index = i;
    }
    Ok(scenes)
}

/// Asks the LLM for structured scenes.
///
/// Never fails: transport and parse errors are logged and yield no records.
/// An unparsable reply is written to `failure_log` when given.
pub async fn extract_with_llm(
    llm: &dyn TextProvider,
    texts: &[String],
    failure_log: Option<&Path>,
) -> Vec<SceneRecord> {
    let combined = join_text_parts(texts);
    if combined.is_empty() {
        tracing::warn!("no text parts to extract scenes from");
        return Vec::new();
    }

    let reply = match llm.complete(&build_extraction_prompt(&combined)).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!(error = %e, "scene extraction request failed");
            return Vec::new();
        }
    };

    match parse_scene_json(&reply) {
        Ok(scenes) => {
            tracing::info!(scenes = scenes.len(), "extracted scenes with LLM");
            scenes
        }
        Err(e) => {
            tracing::error!(error = %e, "could not parse scene JSON from LLM reply");
            if let Some(path) = failure_log {
                if let Err(e) = std::fs::write(path, strip_code_fence(&reply)) {
                    tracing::warn!(path = %path.display(), error = %e, "could not save failed reply");
                }
            }
            Vec::new()
        }
    }
}

/// Regex extraction for one text part.
pub fn extract_with_patterns(text: &str) -> SceneRecord {
    let scene_number = SCENE_NUMBER
        .captures(text)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0);

    let caption = QUOTED
        .captures(text)
        .map(|c| c[1].to_string())
        .or_else(|| {
            SENTENCE
                .find_iter(text)
                .map(|m| m.as_str())
                .min_by_key(|s| s.chars().count())
                .map(str::to_string)
        })
        .unwrap_or_default();

    SceneRecord::new(0, scene_number, "", caption, DEFAULT_SPEAKER)
}

/// Extracts scenes from the generator's text parts.
///
/// Tries the LLM when one is given, then falls back to per-part regex
/// extraction. Output order follows the text parts.
pub async fn extract_scenes(
    llm: Option<&dyn TextProvider>,
    texts: &[String],
    failure_log: Option<&Path>,
) -> Vec<SceneRecord> {
    if let Some(llm) = llm {
        let scenes = extract_with_llm(llm, texts, failure_log).await;
        if !scenes.is_empty() {
            return scenes;
        }
        tracing::warn!("LLM extraction yielded nothing, falling back to pattern extraction");
    }

    texts
        .iter()
        .filter(|t| !t.trim().is_empty())
        .enumerate()
        .map(|(i, text)| {
            let mut scene = extract_with_patterns(text);
            scene.index = i;
            scene.visual_description = text.trim().to_string();
            scene
        })
        .collect()
}
