//! Fakes shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storyreel::media::Retime;
use storyreel::{
    Compositor, GeneratedAudio, GeneratedImage, GeneratedVideo, GenerationRequest,
    GenerationResponse, ImageFormat, ImageProvider, ImageProviderKind, MusicFetcher, MusicSource,
    Result, SpeechProvider, SpeechProviderKind, SpeechRequest, StoryReelError, Studio,
    VideoGenerationRequest, VideoMetadata, VideoProvider, VideoProviderKind,
};

/// Writes a 4x4 PNG to `path`.
pub fn write_png(path: &Path, shade: u8) {
    std::fs::write(path, png_bytes(shade)).unwrap();
}

pub fn png_bytes(shade: u8) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(4, 4, image::Rgb([shade, shade, 90]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Always returns `frames` images with `SCENE n: "Line n."` texts.
pub struct FixedFrames {
    pub frames: usize,
    pub calls: AtomicUsize,
}

impl FixedFrames {
    pub fn new(frames: usize) -> Self {
        Self {
            frames,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ImageProvider for FixedFrames {
    async fn generate(&self, _request: &GenerationRequest) -> Result<GenerationResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(GenerationResponse {
            texts: (1..=self.frames)
                .map(|n| format!("SCENE {n}: \"Line {n}.\""))
                .collect(),
            images: (0..self.frames)
                .map(|i| GeneratedImage::new(png_bytes(i as u8 * 20), ImageFormat::Png))
                .collect(),
            metadata: Default::default(),
        })
    }

    fn kind(&self) -> ImageProviderKind {
        ImageProviderKind::Gemini
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Records every narrated text.
#[derive(Default)]
pub struct EchoSpeech {
    pub texts: Mutex<Vec<String>>,
}

impl EchoSpeech {
    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechProvider for EchoSpeech {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<GeneratedAudio> {
        self.texts.lock().unwrap().push(request.text.clone());
        Ok(GeneratedAudio::mp3(request.text.as_bytes().to_vec()))
    }

    fn kind(&self) -> SpeechProviderKind {
        SpeechProviderKind::ElevenLabs
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Returns a clip for every request.
#[derive(Default)]
pub struct StubVideo {
    pub calls: AtomicUsize,
}

#[async_trait]
impl VideoProvider for StubVideo {
    async fn generate(&self, _request: &VideoGenerationRequest) -> Result<GeneratedVideo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(GeneratedVideo::new(
            b"clip".to_vec(),
            "video/mp4",
            VideoProviderKind::Fal,
            VideoMetadata::default(),
        ))
    }

    fn kind(&self) -> VideoProviderKind {
        VideoProviderKind::Fal
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Writes placeholder outputs; every probe reports `duration`.
pub struct TouchCompositor {
    pub duration: f64,
    pub segments: Mutex<Vec<PathBuf>>,
    pub retimes: Mutex<Vec<Retime>>,
}

impl Default for TouchCompositor {
    fn default() -> Self {
        Self {
            duration: 2.5,
            segments: Mutex::default(),
            retimes: Mutex::default(),
        }
    }
}

#[async_trait]
impl Compositor for TouchCompositor {
    async fn probe_duration(&self, _path: &Path) -> Result<f64> {
        Ok(self.duration)
    }

    async fn render_still(
        &self,
        image: &Path,
        _narration: Option<&Path>,
        _duration: f64,
        output: &Path,
    ) -> Result<()> {
        self.segments.lock().unwrap().push(image.to_path_buf());
        std::fs::write(output, b"seg")?;
        Ok(())
    }

    async fn render_clip(
        &self,
        clip: &Path,
        _narration: Option<&Path>,
        retime: Option<Retime>,
        output: &Path,
    ) -> Result<()> {
        self.segments.lock().unwrap().push(clip.to_path_buf());
        if let Some(r) = retime {
            self.retimes.lock().unwrap().push(r);
        }
        std::fs::write(output, b"seg")?;
        Ok(())
    }

    async fn concat(&self, _segments: &[&Path], output: &Path) -> Result<()> {
        std::fs::write(output, b"video")?;
        Ok(())
    }

    async fn prepare_music(
        &self,
        _music: &Path,
        _duration: f64,
        _volume: f32,
        output: &Path,
    ) -> Result<()> {
        std::fs::write(output, b"bed")?;
        Ok(())
    }

    async fn mix_music(&self, _video: &Path, _music: &Path, output: &Path) -> Result<()> {
        std::fs::write(output, b"mixed")?;
        Ok(())
    }
}

/// Music fetching is never expected in these tests.
pub struct NoMusic;

#[async_trait]
impl MusicFetcher for NoMusic {
    async fn fetch(&self, _source: &MusicSource, _dest_dir: &Path) -> Result<PathBuf> {
        Err(StoryReelError::Media("music disabled in tests".into()))
    }
}

/// A studio wired to the fakes above.
pub fn studio(
    root: &Path,
    frames: usize,
    speech: Arc<EchoSpeech>,
    video: Option<Arc<StubVideo>>,
) -> Studio {
    let mut builder = Studio::builder()
        .image_provider(Arc::new(FixedFrames::new(frames)))
        .speech_provider(speech)
        .compositor(Arc::new(TouchCompositor::default()))
        .music_fetcher(Arc::new(NoMusic))
        .output_root(root)
        .acquisition_delays(Duration::ZERO, Duration::ZERO);
    if let Some(video) = video {
        builder = builder.video_provider(video);
    }
    builder.build().unwrap()
}
