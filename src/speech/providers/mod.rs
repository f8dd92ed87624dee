//! Speech providers.

mod elevenlabs;

pub use elevenlabs::{
    ElevenLabsModel, ElevenLabsProvider, ElevenLabsProviderBuilder, DEFAULT_VOICE_ID,
};
