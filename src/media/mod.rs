//! Local media plumbing: segment rendering, concatenation, music, GIFs.
//!
//! The [`Compositor`] trait is the seam between the pipeline and the local
//! toolchain. [`FfmpegCompositor`] drives `ffmpeg`/`ffprobe` subprocesses.

mod compositor;
mod ffmpeg;
mod gif;
mod music;

pub use compositor::{Compositor, Retime};
pub use ffmpeg::FfmpegCompositor;
pub use gif::{write_gif, GIF_FRAME_DELAY};
pub use music::{
    extract_youtube_id, MusicDownloader, MusicFetcher, MusicSource, MusicVolume,
};
