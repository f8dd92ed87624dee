//! Orchestration of a whole run, fresh or resumed.

use crate::config::{Config, FAL_KEY};
use crate::error::{Result, StoryReelError};
use crate::image::providers::GeminiProvider;
use crate::image::ImageProvider;
use crate::media::{Compositor, FfmpegCompositor, MusicDownloader, MusicFetcher, MusicSource, MusicVolume};
use crate::pipeline::acquire::{
    acquire_frames, AcceptanceThreshold, AcquisitionObserver, AcquisitionPolicy,
};
use crate::pipeline::animate::{animate_all, AnimationOptions};
use crate::pipeline::compose::{compose, compose_gif, CompositionOptions, SegmentKind};
use crate::pipeline::extract::extract_scenes;
use crate::pipeline::layout::RunLayout;
use crate::pipeline::narrate::{sanitize_caption, synthesize_all, NarrationOptions};
use crate::pipeline::reconcile::{reconcile, reconstruct};
use crate::pipeline::report::BatchReport;
use crate::pipeline::scene::SceneRecord;
use crate::speech::providers::{ElevenLabsProvider, DEFAULT_VOICE_ID};
use crate::speech::SpeechProvider;
use crate::text::providers::GeminiTextProvider;
use crate::text::TextProvider;
use crate::video::providers::{FalVideoModel, FalVideoProvider};
use crate::video::VideoProvider;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Ad description used when the caller gives none.
pub const DEFAULT_DESCRIPTION: &str =
    "a TV ad for a mushroom supplement company. Make it ULTRA FUNNY and absurd in a Wes Anderson style.";

/// Builds the frame generation prompt.
///
/// With a seed image the prompt asks for visual consistency with it.
pub fn build_generation_prompt(description: &str, frames: usize, with_seed_image: bool) -> String {
    if with_seed_image {
        format!(
            "I'm providing an image as a starting point. GENERATE (do not describe) a sequence of {frames} actual images that MUST use the style, colors, and visual elements from this image.

Each image should be a frame in {description}
Each generated image should be a different scene, but MUST maintain visual consistency with the provided image.

IMPORTANT:
- The generated images MUST look like they belong in the same visual universe as the provided image
- Use similar color palette, artistic style, and visual elements as the provided image
- For each image, please provide:
  1. SCENE X: (where X is the scene number)
  2. A detailed visual description of what's in the image
  3. A caption that fits the scene

Please return actual generated images, not just text descriptions."
        )
    } else {
        format!(
            "GENERATE (do not describe) a sequence of {frames} actual images.
Each image should be a frame in {description}
Each generated image should be a different scene.

IMPORTANT: For each image, please provide:
1. SCENE X: (where X is the scene number)
2. A detailed visual description of what's in the image
3. A caption that fits the scene
Please return actual generated images, not just text descriptions."
        )
    }
}

/// Parameters persisted in `run.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// What the ad is about.
    pub description: String,
    /// Frames asked for.
    pub target_frames: usize,
    /// Generation attempts allowed.
    pub max_attempts: u32,
    /// Narration voice.
    pub voice_id: String,
    /// Background music reference as given by the user.
    pub music: Option<String>,
    /// Background music level.
    pub music_volume: f32,
    /// Whether frames are animated.
    pub animate: bool,
    /// fal.ai model used for animation.
    pub video_model: String,
    /// File name of the copied seed image, if any.
    pub seed_image: Option<String>,
    /// When the run was created.
    pub created_at: Option<DateTime<Local>>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            description: DEFAULT_DESCRIPTION.to_string(),
            target_frames: 5,
            max_attempts: 5,
            voice_id: DEFAULT_VOICE_ID.to_string(),
            music: None,
            music_volume: MusicVolume::DEFAULT.get(),
            animate: false,
            video_model: FalVideoModel::default().to_string(),
            seed_image: None,
            created_at: None,
        }
    }
}

impl RunSettings {
    fn music_source(&self) -> Option<MusicSource> {
        let reference = self.music.as_deref()?.trim();
        if reference.is_empty() {
            return None;
        }
        match MusicSource::parse(reference) {
            Ok(source) => Some(source),
            Err(e) => {
                tracing::warn!(reference, error = %e, "ignoring unusable music reference");
                None
            }
        }
    }

    fn composition_options(&self) -> CompositionOptions {
        CompositionOptions {
            music: self.music_source(),
            music_volume: MusicVolume::new(self.music_volume),
            ..CompositionOptions::default()
        }
    }
}

/// A fresh run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// What the ad is about; [`DEFAULT_DESCRIPTION`] when `None`.
    pub description: Option<String>,
    /// Frames asked for.
    pub target_frames: usize,
    /// Generation attempts allowed.
    pub max_attempts: u32,
    /// Narration voice.
    pub voice_id: String,
    /// Background music reference (YouTube URL or id, URL, or file).
    pub music: Option<String>,
    /// Background music level.
    pub music_volume: f32,
    /// Animate frames into clips.
    pub animate: bool,
    /// fal.ai model for animation.
    pub video_model: FalVideoModel,
    /// Image whose style the frames should follow.
    pub seed_image: Option<PathBuf>,
}

impl Default for RunRequest {
    fn default() -> Self {
        Self {
            description: None,
            target_frames: 5,
            max_attempts: 5,
            voice_id: DEFAULT_VOICE_ID.to_string(),
            music: None,
            music_volume: MusicVolume::DEFAULT.get(),
            animate: false,
            video_model: FalVideoModel::default(),
            seed_image: None,
        }
    }
}

impl RunRequest {
    fn settings(&self, seed_image: Option<String>) -> RunSettings {
        RunSettings {
            description: self
                .description
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            target_frames: self.target_frames,
            max_attempts: self.max_attempts,
            voice_id: self.voice_id.clone(),
            music: self.music.clone(),
            music_volume: MusicVolume::new(self.music_volume).get(),
            animate: self.animate,
            video_model: self.video_model.to_string(),
            seed_image,
            created_at: Some(Local::now()),
        }
    }
}

/// Changes applied when resuming a run. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ResumeOverrides {
    /// New narration voice.
    pub voice_id: Option<String>,
    /// New background music reference.
    pub music: Option<String>,
    /// New music level.
    pub music_volume: Option<f32>,
    /// Turn animation on or off.
    pub animate: Option<bool>,
    /// New animation model.
    pub video_model: Option<String>,
    /// Regenerate all narration even if every scene already has audio.
    pub renarrate: bool,
}

/// Applies `overrides` on top of the stored settings.
pub fn merge_resume_settings(stored: RunSettings, overrides: &ResumeOverrides) -> RunSettings {
    RunSettings {
        voice_id: overrides.voice_id.clone().unwrap_or(stored.voice_id),
        music: overrides.music.clone().or(stored.music),
        music_volume: overrides
            .music_volume
            .map(|v| MusicVolume::new(v).get())
            .unwrap_or(stored.music_volume),
        animate: overrides.animate.unwrap_or(stored.animate),
        video_model: overrides.video_model.clone().unwrap_or(stored.video_model),
        ..stored
    }
}

/// Reads a run's stored settings and applies `overrides`.
///
/// Runs without `run.json` start from the defaults.
pub fn resolve_resume_settings(dir: &Path, overrides: &ResumeOverrides) -> Result<RunSettings> {
    let layout = RunLayout::open(dir)?;
    let stored = layout.load_settings::<RunSettings>()?.unwrap_or_else(|| {
        tracing::info!(path = %dir.display(), "no run.json, using default settings");
        RunSettings::default()
    });
    Ok(merge_resume_settings(stored, overrides))
}

/// What a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Run directory.
    pub run_dir: PathBuf,
    /// Frames saved.
    pub frames: usize,
    /// Scene records.
    pub scenes: usize,
    /// Whether the frame count met the threshold. `None` on resume.
    pub accepted: Option<bool>,
    /// Generation attempts used. `None` on resume.
    pub attempts: Option<u32>,
    /// Per-scene narration outcomes, empty when narration was reused.
    pub narration: BatchReport<PathBuf>,
    /// Per-scene animation outcomes.
    pub animation: Option<BatchReport<PathBuf>>,
    /// Looping GIF.
    pub gif: Option<PathBuf>,
    /// Narrated stills video.
    pub narrated_video: Option<PathBuf>,
    /// Narrated animated video.
    pub final_video: Option<PathBuf>,
}

/// Runs the pipeline against a set of collaborators.
pub struct Studio {
    images: Arc<dyn ImageProvider>,
    text: Option<Arc<dyn TextProvider>>,
    speech: Arc<dyn SpeechProvider>,
    video: Option<Arc<dyn VideoProvider>>,
    compositor: Arc<dyn Compositor>,
    music: Arc<dyn MusicFetcher>,
    observer: Arc<dyn AcquisitionObserver>,
    output_root: PathBuf,
    threshold: AcceptanceThreshold,
    acquisition_delays: (Duration, Duration),
    narration_concurrency: usize,
    animation: AnimationOptions,
}

impl std::fmt::Debug for Studio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Studio")
            .field("images", &self.images.name())
            .field("speech", &self.speech.name())
            .field("animates", &self.video.is_some())
            .field("output_root", &self.output_root)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Studio`].
#[derive(Default)]
pub struct StudioBuilder {
    images: Option<Arc<dyn ImageProvider>>,
    text: Option<Arc<dyn TextProvider>>,
    speech: Option<Arc<dyn SpeechProvider>>,
    video: Option<Arc<dyn VideoProvider>>,
    compositor: Option<Arc<dyn Compositor>>,
    music: Option<Arc<dyn MusicFetcher>>,
    observer: Option<Arc<dyn AcquisitionObserver>>,
    output_root: Option<PathBuf>,
    threshold: Option<AcceptanceThreshold>,
    acquisition_delays: Option<(Duration, Duration)>,
    narration_concurrency: Option<usize>,
    animation: Option<AnimationOptions>,
}

impl StudioBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame generator. Required.
    pub fn image_provider(mut self, provider: Arc<dyn ImageProvider>) -> Self {
        self.images = Some(provider);
        self
    }

    /// LLM for scene extraction and animation prompts. Without one, the
    /// pattern fallback and fixed prompts are used.
    pub fn text_provider(mut self, provider: Arc<dyn TextProvider>) -> Self {
        self.text = Some(provider);
        self
    }

    /// Narration provider. Required.
    pub fn speech_provider(mut self, provider: Arc<dyn SpeechProvider>) -> Self {
        self.speech = Some(provider);
        self
    }

    /// Animation provider. Required only for runs that animate.
    pub fn video_provider(mut self, provider: Arc<dyn VideoProvider>) -> Self {
        self.video = Some(provider);
        self
    }

    /// Media compositor. Defaults to [`FfmpegCompositor`].
    pub fn compositor(mut self, compositor: Arc<dyn Compositor>) -> Self {
        self.compositor = Some(compositor);
        self
    }

    /// Music fetcher. Defaults to [`MusicDownloader`].
    pub fn music_fetcher(mut self, fetcher: Arc<dyn MusicFetcher>) -> Self {
        self.music = Some(fetcher);
        self
    }

    /// Progress observer for frame acquisition.
    pub fn observer(mut self, observer: Arc<dyn AcquisitionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Directory new runs are created under.
    pub fn output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = Some(root.into());
        self
    }

    /// Frame count acceptance rule.
    pub fn threshold(mut self, threshold: AcceptanceThreshold) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Waits after a short response and after a failed generation call.
    pub fn acquisition_delays(mut self, retry: Duration, error: Duration) -> Self {
        self.acquisition_delays = Some((retry, error));
        self
    }

    /// Scenes narrated at once.
    pub fn narration_concurrency(mut self, concurrency: usize) -> Self {
        self.narration_concurrency = Some(concurrency);
        self
    }

    /// Animation knobs.
    pub fn animation_options(mut self, options: AnimationOptions) -> Self {
        self.animation = Some(options);
        self
    }

    /// Builds the studio.
    pub fn build(self) -> Result<Studio> {
        let images = self
            .images
            .ok_or_else(|| StoryReelError::InvalidRequest("an image provider is required".into()))?;
        let speech = self
            .speech
            .ok_or_else(|| StoryReelError::InvalidRequest("a speech provider is required".into()))?;
        let defaults = AcquisitionPolicy::default();

        Ok(Studio {
            images,
            text: self.text,
            speech,
            video: self.video,
            compositor: self
                .compositor
                .unwrap_or_else(|| Arc::new(FfmpegCompositor::new())),
            music: self
                .music
                .unwrap_or_else(|| Arc::new(MusicDownloader::new())),
            observer: self.observer.unwrap_or_else(|| Arc::new(())),
            output_root: self
                .output_root
                .unwrap_or_else(|| PathBuf::from(crate::config::DEFAULT_OUTPUT_ROOT)),
            threshold: self.threshold.unwrap_or_default(),
            acquisition_delays: self
                .acquisition_delays
                .unwrap_or((defaults.retry_delay, defaults.error_delay)),
            narration_concurrency: self
                .narration_concurrency
                .unwrap_or(NarrationOptions::default().concurrency),
            animation: self.animation.unwrap_or_default(),
        })
    }
}

impl Studio {
    /// Creates a new builder.
    pub fn builder() -> StudioBuilder {
        StudioBuilder::new()
    }

    /// Returns a builder preloaded with the production collaborators.
    ///
    /// Pass `video_model` only for runs that animate; it requires `FAL_KEY`.
    pub fn from_config(
        config: &Config,
        video_model: Option<FalVideoModel>,
    ) -> Result<StudioBuilder> {
        let images = GeminiProvider::builder()
            .api_key(config.gemini_api_key.clone())
            .build()?;
        let text = GeminiTextProvider::builder()
            .api_key(config.gemini_api_key.clone())
            .build()?;
        let speech = ElevenLabsProvider::builder()
            .api_key(config.elevenlabs_api_key.clone())
            .build()?;

        let mut builder = StudioBuilder::new()
            .image_provider(Arc::new(images))
            .text_provider(Arc::new(text))
            .speech_provider(Arc::new(speech))
            .output_root(config.output_root.clone());

        if let Some(model) = video_model {
            let video = FalVideoProvider::builder()
                .api_key(config.require_fal_key()?)
                .model(model)
                .build()?;
            builder = builder.video_provider(Arc::new(video));
        }
        Ok(builder)
    }

    /// Runs every phase in a fresh run directory.
    pub async fn generate(&self, request: RunRequest) -> Result<RunSummary> {
        if request.animate && self.video.is_none() {
            return Err(StoryReelError::MissingConfig(vec![FAL_KEY.to_string()]));
        }
        let seed = match &request.seed_image {
            Some(path) => Some(tokio::fs::read(path).await?),
            None => None,
        };

        let layout = RunLayout::create(&self.output_root, Local::now())?;
        let _lock = layout.lock()?;

        let seed_name = match &request.seed_image {
            Some(path) => copy_seed_image(&layout, path).await,
            None => None,
        };
        let settings = request.settings(seed_name);
        layout.save_settings(&settings)?;

        let prompt = build_generation_prompt(
            &settings.description,
            settings.target_frames,
            seed.is_some(),
        );
        tokio::fs::write(layout.prompt_path(), &prompt).await?;

        let policy = AcquisitionPolicy {
            target_frames: settings.target_frames,
            max_attempts: settings.max_attempts,
            threshold: self.threshold,
            retry_delay: self.acquisition_delays.0,
            error_delay: self.acquisition_delays.1,
        };
        let acquired = acquire_frames(
            self.images.as_ref(),
            &prompt,
            seed.as_deref(),
            &policy,
            self.observer.as_ref(),
        )
        .await?;

        let mut frames = Vec::with_capacity(acquired.images.len());
        for (part, image) in acquired.images.iter().enumerate() {
            let path = layout.frame_path(frames.len());
            match image.save_png(&path) {
                Ok(()) => frames.push(path),
                Err(e) => tracing::warn!(part, error = %e, "skipping undecodable image part"),
            }
        }
        if frames.is_empty() {
            return Err(StoryReelError::NoFrames);
        }
        tracing::info!(frames = frames.len(), "frames saved");

        let failure_log = layout.failed_extraction_path();
        let scenes = extract_scenes(self.text.as_deref(), &acquired.texts, Some(&failure_log)).await;
        let scenes = reconcile(scenes, &frames);
        layout.save_scenes(&scenes)?;

        let mut summary = self.finish(&layout, scenes, &settings, true).await?;
        summary.accepted = Some(acquired.accepted);
        summary.attempts = Some(acquired.attempts);
        Ok(summary)
    }

    /// Re-runs narration, animation and composition for an existing run.
    ///
    /// Narration is regenerated when a scene with a caption has no audio or
    /// when `overrides.renarrate` is set. Changed settings are saved.
    pub async fn resume(&self, dir: &Path, overrides: ResumeOverrides) -> Result<RunSummary> {
        let layout = RunLayout::open(dir)?;
        if !layout.is_run()? {
            return Err(StoryReelError::NotARun(dir.to_path_buf()));
        }
        let _lock = layout.lock()?;

        let settings = resolve_resume_settings(dir, &overrides)?;
        if settings.animate && self.video.is_none() {
            return Err(StoryReelError::MissingConfig(vec![FAL_KEY.to_string()]));
        }
        let scenes = reconstruct(&layout)?;
        layout.ensure_dirs()?;
        layout.save_settings(&settings)?;

        let missing_audio = scenes
            .iter()
            .any(|s| s.audio_path.is_none() && !sanitize_caption(&s.caption).is_empty());
        if missing_audio {
            tracing::info!("some scenes lack narration, regenerating");
        }
        layout.save_scenes(&scenes)?;

        self.finish(&layout, scenes, &settings, overrides.renarrate || missing_audio)
            .await
    }

    /// Narration, GIF, stills video and, when enabled, animation.
    async fn finish(
        &self,
        layout: &RunLayout,
        scenes: Vec<SceneRecord>,
        settings: &RunSettings,
        narrate: bool,
    ) -> Result<RunSummary> {
        let (mut scenes, narration) = if narrate {
            let options = NarrationOptions {
                voice_id: settings.voice_id.clone(),
                concurrency: self.narration_concurrency,
                ..NarrationOptions::default()
            };
            synthesize_all(Arc::clone(&self.speech), scenes, layout, &options).await?
        } else {
            (scenes, BatchReport::new())
        };
        layout.save_scenes(&scenes)?;

        let frames: Vec<PathBuf> = scenes.iter().filter_map(|s| s.image_path.clone()).collect();
        let composition = settings.composition_options();

        let gif = match compose_gif(frames.clone(), layout.gif_path()).await {
            Ok(_) => Some(layout.gif_path()),
            Err(e) => {
                tracing::warn!(error = %e, "could not write GIF");
                None
            }
        };

        let narrated_video = degrade(
            compose(
                self.compositor.as_ref(),
                self.music.as_ref(),
                &frames,
                SegmentKind::Still,
                &scenes,
                &layout.narrated_video_path(),
                &composition,
            )
            .await,
            "narrated stills video",
        )?;

        let mut summary = RunSummary {
            run_dir: layout.root().to_path_buf(),
            frames: frames.len(),
            scenes: scenes.len(),
            accepted: None,
            attempts: None,
            narration,
            animation: None,
            gif,
            narrated_video,
            final_video: None,
        };

        if !settings.animate {
            return Ok(summary);
        }
        let Some(video) = &self.video else {
            return Err(StoryReelError::MissingConfig(vec![FAL_KEY.to_string()]));
        };

        let (clips, animation) = animate_all(
            Arc::clone(video),
            self.text.clone(),
            &mut scenes,
            layout,
            &self.animation,
        )
        .await;
        layout.save_scenes(&scenes)?;
        summary.animation = Some(animation);

        if clips.is_empty() {
            tracing::error!("no clips were produced, skipping animated video");
            return Ok(summary);
        }
        summary.final_video = degrade(
            compose(
                self.compositor.as_ref(),
                self.music.as_ref(),
                &clips,
                SegmentKind::Clip,
                &scenes,
                &layout.final_video_path(),
                &composition,
            )
            .await,
            "animated video",
        )?;
        Ok(summary)
    }
}

/// Keeps `NoFrames` terminal; any other composition failure only loses
/// that one video.
fn degrade(result: Result<PathBuf>, what: &str) -> Result<Option<PathBuf>> {
    match result {
        Ok(path) => Ok(Some(path)),
        Err(StoryReelError::NoFrames) => Err(StoryReelError::NoFrames),
        Err(e) => {
            tracing::error!(error = %e, "could not compose {what}, continuing");
            Ok(None)
        }
    }
}

/// Copies the seed image into the run as `initial_image_<name>`.
async fn copy_seed_image(layout: &RunLayout, source: &Path) -> Option<String> {
    let name = source.file_name()?.to_string_lossy();
    let target = format!("initial_image_{name}");
    match tokio::fs::copy(source, layout.root().join(&target)).await {
        Ok(_) => {
            tracing::info!(path = %source.display(), "copied seed image");
            Some(target)
        }
        Err(e) => {
            tracing::warn!(path = %source.display(), error = %e, "could not copy seed image");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        FakeMusicFetcher, FakeSpeechProvider, FakeVideoProvider, RecordingCompositor,
        ScriptedImageProvider, ScriptedTextProvider,
    };

    fn studio(
        root: &Path,
        images: ScriptedImageProvider,
        video: Option<FakeVideoProvider>,
    ) -> (Studio, Arc<RecordingCompositor>) {
        let compositor = Arc::new(RecordingCompositor::with_default_duration(2.0));
        let mut builder = Studio::builder()
            .image_provider(Arc::new(images))
            .speech_provider(Arc::new(FakeSpeechProvider::default()))
            .compositor(compositor.clone())
            .music_fetcher(Arc::new(FakeMusicFetcher::default()))
            .output_root(root)
            .acquisition_delays(Duration::ZERO, Duration::ZERO);
        if let Some(video) = video {
            builder = builder.video_provider(Arc::new(video));
        }
        (builder.build().unwrap(), compositor)
    }

    #[test]
    fn test_prompts() {
        let plain = build_generation_prompt(DEFAULT_DESCRIPTION, 5, false);
        assert!(plain.starts_with("GENERATE (do not describe) a sequence of 5 actual images."));
        assert!(plain.contains("Each image should be a frame in a TV ad for a mushroom"));

        let seeded = build_generation_prompt("a cat food ad", 3, true);
        assert!(seeded.starts_with("I'm providing an image as a starting point."));
        assert!(seeded.contains("sequence of 3 actual images"));
        assert!(seeded.contains("a cat food ad"));
    }

    #[test]
    fn test_merge_resume_settings() {
        let stored = RunSettings {
            music: Some("dQw4w9WgXcQ".into()),
            music_volume: 0.3,
            video_model: "fal-ai/luma-dream-machine/ray-2-flash/image-to-video".into(),
            ..RunSettings::default()
        };

        let kept = merge_resume_settings(stored.clone(), &ResumeOverrides::default());
        assert_eq!(kept, stored);

        let changed = merge_resume_settings(
            stored,
            &ResumeOverrides {
                music_volume: Some(1.5),
                animate: Some(true),
                ..ResumeOverrides::default()
            },
        );
        assert_eq!(changed.music_volume, 0.5);
        assert!(changed.animate);
        assert_eq!(changed.music.as_deref(), Some("dQw4w9WgXcQ"));
    }

    #[test]
    fn test_settings_tolerate_missing_fields() {
        let settings: RunSettings = serde_json::from_str(r#"{"voice_id": "v"}"#).unwrap();
        assert_eq!(settings.voice_id, "v");
        assert_eq!(settings.target_frames, 5);
        assert_eq!(settings.video_model, "fal-ai/veo2/image-to-video");
    }

    #[test]
    fn test_builder_requires_providers() {
        assert!(Studio::builder().build().is_err());
    }

    #[tokio::test]
    async fn test_generate_end_to_end_with_fallback_extraction() {
        let tmp = tempfile::tempdir().unwrap();
        let (studio, compositor) = studio(
            tmp.path(),
            ScriptedImageProvider::with_frame_counts(&[4]),
            None,
        );

        let summary = studio.generate(RunRequest::default()).await.unwrap();
        let layout = RunLayout::new(&summary.run_dir);

        assert_eq!(summary.frames, 4);
        assert_eq!(summary.accepted, Some(true));
        assert_eq!(summary.narration.produced(), vec![0, 1, 2, 3]);
        assert!(layout.prompt_path().is_file());
        assert!(layout.gif_path().is_file());
        assert!(layout.narrated_video_path().is_file());
        assert!(summary.final_video.is_none());
        drop(layout.lock().unwrap());

        let scenes = layout.load_scenes().unwrap().unwrap();
        assert_eq!(scenes.len(), 4);
        assert_eq!(scenes[2].caption, "Caption 3.");
        assert_eq!(scenes[2].audio_path, Some(layout.audio_path(2)));
        assert_eq!(compositor.concat_inputs(), vec![4]);

        let settings: RunSettings = layout.load_settings().unwrap().unwrap();
        assert_eq!(settings.description, DEFAULT_DESCRIPTION);
    }

    #[tokio::test]
    async fn test_generate_uses_llm_scenes() {
        let tmp = tempfile::tempdir().unwrap();
        let compositor = Arc::new(RecordingCompositor::default());
        let llm = ScriptedTextProvider::new(vec![Ok(r#"[
            {"scene_number": 1, "visual_description": "a", "caption": "Spores!", "speaker": "Mascot"}
        ]"#
        .to_string())]);
        let studio = Studio::builder()
            .image_provider(Arc::new(ScriptedImageProvider::with_frame_counts(&[2])))
            .text_provider(Arc::new(llm))
            .speech_provider(Arc::new(FakeSpeechProvider::default()))
            .compositor(compositor)
            .music_fetcher(Arc::new(FakeMusicFetcher::default()))
            .output_root(tmp.path())
            .acquisition_delays(Duration::ZERO, Duration::ZERO)
            .build()
            .unwrap();

        let summary = studio
            .generate(RunRequest {
                target_frames: 2,
                ..RunRequest::default()
            })
            .await
            .unwrap();
        let scenes = RunLayout::new(&summary.run_dir).load_scenes().unwrap().unwrap();
        assert_eq!(scenes.len(), 2);
        assert_eq!(scenes[0].caption, "Spores!");
        assert_eq!(scenes[1].caption, "Scene 2");
    }

    #[tokio::test]
    async fn test_generate_with_animation() {
        let tmp = tempfile::tempdir().unwrap();
        let (studio, compositor) = studio(
            tmp.path(),
            ScriptedImageProvider::with_frame_counts(&[3]),
            Some(FakeVideoProvider::default()),
        );
        let summary = studio
            .generate(RunRequest {
                target_frames: 3,
                animate: true,
                ..RunRequest::default()
            })
            .await
            .unwrap();

        let layout = RunLayout::new(&summary.run_dir);
        assert_eq!(summary.final_video, Some(layout.final_video_path()));
        assert_eq!(summary.animation.unwrap().produced(), vec![0, 1, 2]);
        assert!(layout.clip_path(1).is_file());
        assert_eq!(compositor.concat_inputs(), vec![3, 3]);
    }

    #[tokio::test]
    async fn test_failed_stills_video_does_not_stop_animation() {
        let tmp = tempfile::tempdir().unwrap();
        let (studio, compositor) = studio(
            tmp.path(),
            ScriptedImageProvider::with_frame_counts(&[2]),
            Some(FakeVideoProvider::default()),
        );
        compositor.fail_concat_into("animation.mp4");

        let summary = studio
            .generate(RunRequest {
                target_frames: 2,
                animate: true,
                ..RunRequest::default()
            })
            .await
            .unwrap();

        let layout = RunLayout::new(&summary.run_dir);
        assert!(summary.narrated_video.is_none());
        assert!(layout.clip_path(0).is_file());
        assert!(layout.clip_path(1).is_file());
        assert_eq!(summary.final_video, Some(layout.final_video_path()));
    }

    #[tokio::test]
    async fn test_failed_final_video_is_reported_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let (studio, compositor) = studio(
            tmp.path(),
            ScriptedImageProvider::with_frame_counts(&[2]),
            Some(FakeVideoProvider::default()),
        );
        compositor.fail_concat_into("final_video.mp4");

        let summary = studio
            .generate(RunRequest {
                target_frames: 2,
                animate: true,
                ..RunRequest::default()
            })
            .await
            .unwrap();

        assert!(summary.narrated_video.is_some());
        assert_eq!(summary.animation.unwrap().produced(), vec![0, 1]);
        assert!(summary.final_video.is_none());
    }

    #[tokio::test]
    async fn test_resume_leaves_foreign_directory_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let foreign = tmp.path().join("holiday_photos");
        std::fs::create_dir(&foreign).unwrap();
        std::fs::write(foreign.join("beach.jpg"), b"jpg").unwrap();
        let (studio, _) = studio(tmp.path(), ScriptedImageProvider::with_frame_counts(&[]), None);

        let err = studio
            .resume(&foreign, ResumeOverrides::default())
            .await
            .unwrap_err();

        assert!(matches!(err, StoryReelError::NotARun(_)));
        let names: Vec<_> = std::fs::read_dir(&foreign)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["beach.jpg"]);
    }

    #[tokio::test]
    async fn test_resume_after_abandoned_run() {
        let tmp = tempfile::tempdir().unwrap();
        let (studio, _) = studio(tmp.path(), ScriptedImageProvider::with_frame_counts(&[2]), None);
        let first = studio
            .generate(RunRequest {
                target_frames: 2,
                ..RunRequest::default()
            })
            .await
            .unwrap();
        // a killed process leaves its lock file behind
        std::fs::write(first.run_dir.join(".storyreel.lock"), b"999999\n").unwrap();

        let resumed = studio
            .resume(&first.run_dir, ResumeOverrides::default())
            .await
            .unwrap();
        assert_eq!(resumed.frames, 2);
    }

    #[tokio::test]
    async fn test_animation_without_provider_fails_before_work() {
        let tmp = tempfile::tempdir().unwrap();
        let (studio, _) = studio(tmp.path(), ScriptedImageProvider::with_frame_counts(&[3]), None);
        let err = studio
            .generate(RunRequest {
                animate: true,
                ..RunRequest::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoryReelError::MissingConfig(v) if v == vec![FAL_KEY.to_string()]));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_zero_frames_is_terminal() {
        let tmp = tempfile::tempdir().unwrap();
        let (studio, _) = studio(tmp.path(), ScriptedImageProvider::with_frame_counts(&[0]), None);
        let err = studio
            .generate(RunRequest {
                max_attempts: 1,
                ..RunRequest::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoryReelError::NoFrames));
    }

    #[tokio::test]
    async fn test_resume_keeps_existing_narration() {
        let tmp = tempfile::tempdir().unwrap();
        let (studio, _) = studio(tmp.path(), ScriptedImageProvider::with_frame_counts(&[2]), None);
        let first = studio
            .generate(RunRequest {
                target_frames: 2,
                ..RunRequest::default()
            })
            .await
            .unwrap();

        let resumed = studio
            .resume(&first.run_dir, ResumeOverrides::default())
            .await
            .unwrap();
        assert!(resumed.narration.is_empty());
        assert_eq!(resumed.frames, 2);
        assert!(resumed.accepted.is_none());

        let forced = studio
            .resume(
                &first.run_dir,
                ResumeOverrides {
                    renarrate: true,
                    music: Some("dQw4w9WgXcQ".into()),
                    ..ResumeOverrides::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(forced.narration.produced(), vec![0, 1]);
        let settings: RunSettings = RunLayout::new(&first.run_dir)
            .load_settings()
            .unwrap()
            .unwrap();
        assert_eq!(settings.music.as_deref(), Some("dQw4w9WgXcQ"));
    }
}
