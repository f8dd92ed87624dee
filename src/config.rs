//! Process configuration: credentials and output location.
//!
//! A [`Config`] is resolved once at startup and passed to the provider
//! builders. Nothing in the crate reads credentials from the environment
//! mid-run.

use crate::error::{Result, StoryReelError};
use std::fmt;
use std::path::PathBuf;

/// Gemini API key (frames, scene extraction, animation prompts).
pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
/// ElevenLabs API key (narration).
pub const ELEVENLABS_API_KEY: &str = "ELEVENLABS_API_KEY";
/// fal.ai API key (per-scene animation).
pub const FAL_KEY: &str = "FAL_KEY";
/// Overrides the directory runs are created under.
pub const OUTPUT_DIR_VAR: &str = "STORYREEL_OUTPUT_DIR";

/// Default directory runs are created under.
pub const DEFAULT_OUTPUT_ROOT: &str = "outputs";

/// Resolved credentials and paths.
#[derive(Clone)]
pub struct Config {
    /// Gemini API key.
    pub gemini_api_key: String,
    /// ElevenLabs API key.
    pub elevenlabs_api_key: String,
    /// fal.ai key; only needed when animating scenes.
    pub fal_key: Option<String>,
    /// Directory that holds `run_*` directories.
    pub output_root: PathBuf,
}

impl Config {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through an arbitrary lookup function.
    ///
    /// Every missing required variable is reported in one error so the
    /// operator can fix them all at once. Empty values count as missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let gemini = get(GEMINI_API_KEY);
        let elevenlabs = get(ELEVENLABS_API_KEY);

        let missing: Vec<String> = [(GEMINI_API_KEY, &gemini), (ELEVENLABS_API_KEY, &elevenlabs)]
            .into_iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| name.to_string())
            .collect();

        match (gemini, elevenlabs) {
            (Some(gemini_api_key), Some(elevenlabs_api_key)) => Ok(Self {
                gemini_api_key,
                elevenlabs_api_key,
                fal_key: get(FAL_KEY),
                output_root: get(OUTPUT_DIR_VAR)
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_ROOT)),
            }),
            _ => Err(StoryReelError::MissingConfig(missing)),
        }
    }

    /// Returns the fal.ai key, failing if animation was requested without one.
    pub fn require_fal_key(&self) -> Result<&str> {
        self.fal_key
            .as_deref()
            .ok_or_else(|| StoryReelError::MissingConfig(vec![FAL_KEY.to_string()]))
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("gemini_api_key", &"[REDACTED]")
            .field("elevenlabs_api_key", &"[REDACTED]")
            .field("fal_key", &self.fal_key.as_ref().map(|_| "[REDACTED]"))
            .field("output_root", &self.output_root)
            .finish()
    }
}
