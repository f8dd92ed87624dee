//! Fake collaborators for unit tests.

use crate::error::{Result, StoryReelError};
use crate::image::{
    GeneratedImage, GenerationRequest, GenerationResponse, ImageFormat, ImageProvider,
    ImageProviderKind,
};
use crate::media::{Compositor, MusicFetcher, MusicSource, Retime};
use crate::speech::{GeneratedAudio, SpeechProvider, SpeechProviderKind, SpeechRequest};
use crate::text::{TextProvider, TextProviderKind};
use crate::video::{
    GeneratedVideo, VideoGenerationRequest, VideoMetadata, VideoProvider, VideoProviderKind,
};
use async_trait::async_trait;
use image::{ImageFormat as Codec, Rgb, RgbImage};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A small, valid PNG whose color depends on `seed`.
pub(crate) fn tiny_png(seed: u8) -> Vec<u8> {
    let img = RgbImage::from_pixel(4, 4, Rgb([seed, 120, 200]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, Codec::Png).unwrap();
    out.into_inner()
}

fn api_error(message: &str) -> StoryReelError {
    StoryReelError::Api {
        status: 500,
        message: message.to_string(),
    }
}

/// Returns a scripted number of frames per call.
///
/// Text parts read `SCENE n: "Caption n."`, one per frame.
pub(crate) struct ScriptedImageProvider {
    script: Mutex<VecDeque<Result<usize>>>,
    prompts: Mutex<Vec<String>>,
    seeded: Mutex<usize>,
}

impl ScriptedImageProvider {
    pub(crate) fn new(script: Vec<Result<usize>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
            seeded: Mutex::new(0),
        }
    }

    pub(crate) fn with_frame_counts(counts: &[usize]) -> Self {
        Self::new(counts.iter().map(|n| Ok(*n)).collect())
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub(crate) fn seeded_calls(&self) -> usize {
        *self.seeded.lock().unwrap()
    }
}

#[async_trait]
impl ImageProvider for ScriptedImageProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        if request.seed_image.is_some() {
            *self.seeded.lock().unwrap() += 1;
        }
        let frames = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(api_error("image script exhausted")))?;

        Ok(GenerationResponse {
            texts: (1..=frames)
                .map(|n| format!("SCENE {n}: \"Caption {n}.\""))
                .collect(),
            images: (0..frames)
                .map(|i| GeneratedImage::new(tiny_png(i as u8), ImageFormat::Png))
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

/// Returns scripted completions in order.
pub(crate) struct ScriptedTextProvider {
    script: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedTextProvider {
    pub(crate) fn new(script: Vec<Result<String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextProvider for ScriptedTextProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(api_error("text script exhausted")))
    }

    fn kind(&self) -> TextProviderKind {
        TextProviderKind::Gemini
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Succeeds unless told to fail the first `n` calls for a given text.
#[derive(Default)]
pub(crate) struct FakeSpeechProvider {
    fail_text: Option<String>,
    failures_left: Mutex<u32>,
    requests: Mutex<Vec<SpeechRequest>>,
}

impl FakeSpeechProvider {
    pub(crate) fn failing_first(text: &str, failures: u32) -> Self {
        Self {
            fail_text: Some(text.to_string()),
            failures_left: Mutex::new(failures),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn requests(&self) -> Vec<SpeechRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechProvider for FakeSpeechProvider {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<GeneratedAudio> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail_text.as_deref() == Some(request.text.as_str()) {
            let mut left = self.failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(api_error("voice unavailable"));
            }
        }
        Ok(GeneratedAudio::mp3(b"ID3 fake narration".to_vec()))
    }

    fn kind(&self) -> SpeechProviderKind {
        SpeechProviderKind::ElevenLabs
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Returns a fixed clip unless the prompt contains the failure needle.
#[derive(Default)]
pub(crate) struct FakeVideoProvider {
    fail_on: Option<String>,
    requests: Mutex<Vec<VideoGenerationRequest>>,
}

impl FakeVideoProvider {
    pub(crate) fn failing_on(needle: &str) -> Self {
        Self {
            fail_on: Some(needle.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<VideoGenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoProvider for FakeVideoProvider {
    async fn generate(&self, request: &VideoGenerationRequest) -> Result<GeneratedVideo> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(needle) = &self.fail_on {
            if request.prompt.contains(needle.as_str()) {
                return Err(StoryReelError::VideoGeneration("model refused".into()));
            }
        }
        Ok(GeneratedVideo::new(
            b"fake mp4".to_vec(),
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

/// A successful segment render as seen by [`RecordingCompositor`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RenderCall {
    Still { narrated: bool, duration: f64 },
    Clip { narrated: bool, retime: Option<Retime> },
}

/// Writes placeholder files and records what it was asked to do.
pub(crate) struct RecordingCompositor {
    default_duration: f64,
    durations: Mutex<HashMap<PathBuf, f64>>,
    fail_always: Mutex<HashSet<PathBuf>>,
    fail_narrated: Mutex<HashSet<PathBuf>>,
    fail_concat: Mutex<HashSet<String>>,
    renders: Mutex<Vec<RenderCall>>,
    concats: Mutex<Vec<usize>>,
    music: Mutex<Vec<(f64, f32)>>,
    mixes: Mutex<usize>,
}

impl Default for RecordingCompositor {
    fn default() -> Self {
        Self::with_default_duration(3.0)
    }
}

impl RecordingCompositor {
    pub(crate) fn with_default_duration(secs: f64) -> Self {
        Self {
            default_duration: secs,
            durations: Mutex::default(),
            fail_always: Mutex::default(),
            fail_narrated: Mutex::default(),
            fail_concat: Mutex::default(),
            renders: Mutex::default(),
            concats: Mutex::default(),
            music: Mutex::default(),
            mixes: Mutex::default(),
        }
    }

    pub(crate) fn set_duration(&self, path: &Path, secs: f64) {
        self.durations.lock().unwrap().insert(path.to_path_buf(), secs);
    }

    pub(crate) fn fail_render(&self, input: &Path) {
        self.fail_always.lock().unwrap().insert(input.to_path_buf());
    }

    pub(crate) fn fail_narrated_render(&self, input: &Path) {
        self.fail_narrated.lock().unwrap().insert(input.to_path_buf());
    }

    /// Fails every concat whose output file is named `file_name`.
    pub(crate) fn fail_concat_into(&self, file_name: &str) {
        self.fail_concat.lock().unwrap().insert(file_name.to_string());
    }

    pub(crate) fn renders(&self) -> Vec<RenderCall> {
        self.renders.lock().unwrap().clone()
    }

    pub(crate) fn concat_inputs(&self) -> Vec<usize> {
        self.concats.lock().unwrap().clone()
    }

    pub(crate) fn music_calls(&self) -> Vec<(f64, f32)> {
        self.music.lock().unwrap().clone()
    }

    pub(crate) fn mixes(&self) -> usize {
        *self.mixes.lock().unwrap()
    }

    fn check(&self, input: &Path, narrated: bool) -> Result<()> {
        if self.fail_always.lock().unwrap().contains(input)
            || (narrated && self.fail_narrated.lock().unwrap().contains(input))
        {
            return Err(StoryReelError::Media(format!(
                "cannot render {}",
                input.display()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Compositor for RecordingCompositor {
    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        Ok(self
            .durations
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or(self.default_duration))
    }

    async fn render_still(
        &self,
        image: &Path,
        narration: Option<&Path>,
        duration: f64,
        output: &Path,
    ) -> Result<()> {
        self.check(image, narration.is_some())?;
        std::fs::write(output, b"segment")?;
        self.renders.lock().unwrap().push(RenderCall::Still {
            narrated: narration.is_some(),
            duration,
        });
        Ok(())
    }

    async fn render_clip(
        &self,
        clip: &Path,
        narration: Option<&Path>,
        retime: Option<Retime>,
        output: &Path,
    ) -> Result<()> {
        self.check(clip, narration.is_some())?;
        std::fs::write(output, b"segment")?;
        self.renders.lock().unwrap().push(RenderCall::Clip {
            narrated: narration.is_some(),
            retime,
        });
        Ok(())
    }

    async fn concat(&self, segments: &[&Path], output: &Path) -> Result<()> {
        if segments.is_empty() {
            return Err(StoryReelError::NoFrames);
        }
        let name = output
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if self.fail_concat.lock().unwrap().contains(&name) {
            return Err(StoryReelError::Media("concat failed".into()));
        }
        std::fs::write(output, b"video")?;
        self.concats.lock().unwrap().push(segments.len());
        Ok(())
    }

    async fn prepare_music(
        &self,
        _music: &Path,
        duration: f64,
        volume: f32,
        output: &Path,
    ) -> Result<()> {
        std::fs::write(output, b"music")?;
        self.music.lock().unwrap().push((duration, volume));
        Ok(())
    }

    async fn mix_music(&self, _video: &Path, _music: &Path, output: &Path) -> Result<()> {
        std::fs::write(output, b"mixed")?;
        *self.mixes.lock().unwrap() += 1;
        Ok(())
    }
}

/// Writes a placeholder track, or fails every fetch.
#[derive(Default)]
pub(crate) struct FakeMusicFetcher {
    fail: bool,
}

impl FakeMusicFetcher {
    pub(crate) fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl MusicFetcher for FakeMusicFetcher {
    async fn fetch(&self, source: &MusicSource, dest_dir: &Path) -> Result<PathBuf> {
        if self.fail {
            return Err(StoryReelError::Media(format!("cannot fetch {source:?}")));
        }
        let path = dest_dir.join("background_music.mp3");
        std::fs::write(&path, b"track")?;
        Ok(path)
    }
}
