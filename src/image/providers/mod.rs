//! Frame generation providers.

pub(crate) mod gemini;

pub use gemini::{GeminiModel, GeminiProvider, GeminiProviderBuilder};
