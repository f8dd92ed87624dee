//! Core types for narration synthesis.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Speech provider kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechProviderKind {
    /// ElevenLabs text-to-speech.
    ElevenLabs,
}

impl std::fmt::Display for SpeechProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ElevenLabs => write!(f, "elevenlabs"),
        }
    }
}

/// Voice tuning sent with each synthesis call.
///
/// `similarity_boost` is the expressiveness knob: low stability paired with a
/// high boost reads as more animated delivery.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// Delivery stability, 0.0 to 1.0.
    pub stability: f32,
    /// Expressiveness, 0.0 to 1.0.
    pub similarity_boost: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.5,
        }
    }
}

impl VoiceSettings {
    /// Derives settings from a free-text speaker hint.
    ///
    /// Calm keywords are checked first and lively keywords second, so a hint
    /// matching both ends up lively.
    pub fn for_speaker(speaker: &str) -> Self {
        let speaker = speaker.to_lowercase();
        let mut settings = Self::default();

        if ["formal", "authoritative", "narrator"]
            .iter()
            .any(|k| speaker.contains(k))
        {
            settings = Self {
                stability: 0.7,
                similarity_boost: 0.3,
            };
        }
        if ["excited", "cheerful", "humorous"]
            .iter()
            .any(|k| speaker.contains(k))
        {
            settings = Self {
                stability: 0.3,
                similarity_boost: 0.7,
            };
        }
        settings
    }
}

/// A request to narrate one piece of text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechRequest {
    /// Already-sanitized text to speak.
    pub text: String,
    /// Provider voice identifier.
    pub voice_id: String,
    /// Voice tuning.
    pub settings: VoiceSettings,
}

impl SpeechRequest {
    /// Creates a new request.
    pub fn new(
        text: impl Into<String>,
        voice_id: impl Into<String>,
        settings: VoiceSettings,
    ) -> Self {
        Self {
            text: text.into(),
            voice_id: voice_id.into(),
            settings,
        }
    }
}

/// Synthesized audio bytes.
#[derive(Debug, Clone)]
#[must_use = "generated audio should be saved"]
pub struct GeneratedAudio {
    /// Raw audio bytes.
    pub data: Vec<u8>,
    /// MIME type (e.g., "audio/mpeg").
    pub mime_type: String,
}

impl GeneratedAudio {
    /// Wraps MP3 bytes.
    pub fn mp3(data: Vec<u8>) -> Self {
        Self {
            data,
            mime_type: "audio/mpeg".to_string(),
        }
    }

    /// Saves the audio to the specified path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, &self.data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speaker_keywords() {
        let calm = VoiceSettings::for_speaker("Formal Narrator");
        assert_eq!(calm.stability, 0.7);
        assert_eq!(calm.similarity_boost, 0.3);

        let lively = VoiceSettings::for_speaker("excited host");
        assert_eq!(lively.stability, 0.3);
        assert_eq!(lively.similarity_boost, 0.7);

        assert_eq!(VoiceSettings::for_speaker("Old fisherman"), VoiceSettings::default());
    }

    #[test]
    fn test_lively_keyword_wins_over_calm() {
        let both = VoiceSettings::for_speaker("Humorous narrator");
        assert_eq!(both.stability, 0.3);
        assert_eq!(both.similarity_boost, 0.7);
    }
}
