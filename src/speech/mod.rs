//! Narration (text-to-speech) module.

mod provider;
pub mod providers;
mod types;

pub use provider::{SpeechProvider, SpeechProviderExt};
pub use types::{GeneratedAudio, SpeechProviderKind, SpeechRequest, VoiceSettings};
