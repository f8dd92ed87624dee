//! Video generation providers.

mod fal;

pub use fal::{FalVideoModel, FalVideoProvider, FalVideoProviderBuilder};
