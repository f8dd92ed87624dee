//! Text completion module (scene extraction, animation prompts).

mod provider;
pub mod providers;

pub use provider::{TextProvider, TextProviderKind};
