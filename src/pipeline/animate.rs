//! Per-scene animation of frames into short clips.

use crate::image::image_data_url;
use crate::pipeline::layout::RunLayout;
use crate::pipeline::report::{BatchReport, FailureReason, SceneOutcome, SkipReason};
use crate::pipeline::scene::SceneRecord;
use crate::text::TextProvider;
use crate::video::{ClipDuration, VideoGenerationRequest, VideoProvider, VideoProviderExt};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Knobs for [`animate_all`].
#[derive(Debug, Clone)]
pub struct AnimationOptions {
    /// Clips generated at once.
    pub concurrency: usize,
    /// Requested clip length.
    pub duration: ClipDuration,
    /// Requested aspect ratio.
    pub aspect_ratio: String,
    /// Retries on transient errors.
    pub max_retries: u32,
}

impl Default for AnimationOptions {
    fn default() -> Self {
        Self {
            concurrency: 2,
            duration: ClipDuration::Five,
            aspect_ratio: "16:9".to_string(),
            max_retries: 1,
        }
    }
}

/// Prompt asking the LLM for a motion prompt.
pub fn animation_prompt_request(scene: &SceneRecord) -> String {
    format!(
        r#"Given this information, write a prompt for a "image+text to video" generation AI system. Keep the prompt very short and concise, as continuous text without heading etc. Focus on the action in the scene, camera, lightning:

"visual_description": "{}",
"caption": "{}",
"#,
        scene.visual_description, scene.caption
    )
}

/// Motion prompt used when no LLM answer is available.
pub fn fallback_animation_prompt(scene: &SceneRecord) -> String {
    format!("Animate this scene: {}", scene.caption)
}

/// Asks the LLM for a motion prompt, falling back to a fixed template.
pub async fn animation_prompt(llm: Option<&dyn TextProvider>, scene: &SceneRecord) -> String {
    let Some(llm) = llm else {
        return fallback_animation_prompt(scene);
    };
    match llm.complete(&animation_prompt_request(scene)).await {
        Ok(reply) if !reply.trim().is_empty() => {
            let prompt = reply.trim().to_string();
            tracing::debug!(index = scene.index, %prompt, "animation prompt");
            prompt
        }
        Ok(_) => fallback_animation_prompt(scene),
        Err(e) => {
            tracing::warn!(index = scene.index, error = %e, "animation prompt request failed");
            fallback_animation_prompt(scene)
        }
    }
}

/// Animates every scene that has a frame.
///
/// Clips are saved as `videos/frame_{index:03}_animated.mp4` and recorded
/// on the scene. The returned paths follow record order and leave out
/// scenes that were skipped or failed.
pub async fn animate_all(
    provider: Arc<dyn VideoProvider>,
    llm: Option<Arc<dyn TextProvider>>,
    scenes: &mut [SceneRecord],
    layout: &RunLayout,
    options: &AnimationOptions,
) -> (Vec<PathBuf>, BatchReport<PathBuf>) {
    let mut report = BatchReport::new();
    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let mut handles = Vec::new();

    for (position, scene) in scenes.iter_mut().enumerate() {
        scene.video_path = None;
        let Some(image_path) = scene.image_path.clone() else {
            tracing::warn!(index = scene.index, "scene has no frame, skipping animation");
            report.record(scene.index, SceneOutcome::Skipped(SkipReason::NoImage));
            continue;
        };

        let output = layout.clip_path(scene.index);
        let scene_snapshot = scene.clone();
        let provider = Arc::clone(&provider);
        let llm = llm.clone();
        let sem = Arc::clone(&semaphore);
        let options = options.clone();

        let handle = tokio::spawn(async move {
            let _permit = sem
                .acquire()
                .await
                .map_err(|_| FailureReason::Aborted("semaphore closed".into()))?;

            if let Err(e) = tokio::fs::remove_file(&output).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    return Err(FailureReason::Io(e.to_string()));
                }
            }
            let image = tokio::fs::read(&image_path).await.map_err(|e| {
                FailureReason::MissingInput(format!("{}: {e}", image_path.display()))
            })?;

            let prompt = animation_prompt(llm.as_deref(), &scene_snapshot).await;
            let request = VideoGenerationRequest::new(prompt)
                .with_duration(options.duration)
                .with_aspect_ratio(options.aspect_ratio)
                .with_source_image(image_data_url(&image));

            tracing::info!(index = scene_snapshot.index, "animating frame");
            let video = provider
                .generate_with_retries(&request, options.max_retries)
                .await?;
            video.save(&output)?;
            Ok::<_, FailureReason>(output)
        });
        handles.push((position, handle));
    }

    let mut clips = Vec::with_capacity(handles.len());
    for (position, handle) in handles {
        let index = scenes[position].index;
        let outcome = match handle.await {
            Ok(Ok(path)) => {
                tracing::info!(index, path = %path.display(), "clip saved");
                scenes[position].video_path = Some(path.clone());
                clips.push(path.clone());
                SceneOutcome::Produced(path)
            }
            Ok(Err(reason)) => {
                tracing::error!(index, error = %reason, "animation failed");
                SceneOutcome::Failed(reason)
            }
            Err(e) => {
                tracing::error!(index, error = %e, "animation task failed");
                SceneOutcome::Failed(FailureReason::Aborted(e.to_string()))
            }
        };
        report.record(index, outcome);
    }

    (clips, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{tiny_png, FakeVideoProvider, ScriptedTextProvider};

    fn layout_with_frames(n: usize) -> (tempfile::TempDir, RunLayout, Vec<SceneRecord>) {
        let tmp = tempfile::tempdir().unwrap();
        let layout = RunLayout::open(tmp.path()).unwrap();
        layout.ensure_dirs().unwrap();
        let scenes = (0..n)
            .map(|i| {
                std::fs::write(layout.frame_path(i), tiny_png(i as u8)).unwrap();
                let mut s = SceneRecord::new(i, (i + 1) as u32, "a forest", format!("Cap {i}."), "n");
                s.image_path = Some(layout.frame_path(i));
                s
            })
            .collect();
        (tmp, layout, scenes)
    }

    #[tokio::test]
    async fn test_prompt_fallbacks() {
        let scene = SceneRecord::new(0, 1, "v", "Buy spores.", "n");
        assert_eq!(
            animation_prompt(None, &scene).await,
            "Animate this scene: Buy spores."
        );

        let failing = ScriptedTextProvider::new(vec![Err(crate::error::StoryReelError::Auth(
            "no".into(),
        ))]);
        assert_eq!(
            animation_prompt(Some(&failing), &scene).await,
            "Animate this scene: Buy spores."
        );

        let ok = ScriptedTextProvider::new(vec![Ok("  Slow dolly in.  ".into())]);
        assert_eq!(animation_prompt(Some(&ok), &scene).await, "Slow dolly in.");
        assert!(ok.prompts()[0].contains(r#""caption": "Buy spores.""#));
    }

    #[tokio::test]
    async fn test_clips_in_record_order_and_failures_isolated() {
        let (_tmp, layout, mut scenes) = layout_with_frames(3);
        let provider = Arc::new(FakeVideoProvider::failing_on("Cap 1."));
        let (clips, report) = animate_all(
            provider.clone(),
            None,
            &mut scenes,
            &layout,
            &AnimationOptions::default(),
        )
        .await;

        assert_eq!(clips, vec![layout.clip_path(0), layout.clip_path(2)]);
        assert_eq!(report.failed(), vec![1]);
        assert!(scenes[1].video_path.is_none());
        assert_eq!(scenes[2].video_path, Some(layout.clip_path(2)));
        assert!(layout.clip_path(0).is_file());

        let requests = provider.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests
            .iter()
            .all(|r| r.aspect_ratio == "16:9" && r.duration == ClipDuration::Five));
        assert!(requests[0]
            .source_image_url
            .as_deref()
            .unwrap()
            .starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_scene_without_frame_skipped() {
        let (_tmp, layout, mut scenes) = layout_with_frames(1);
        scenes.push(SceneRecord::placeholder(1));
        let provider = Arc::new(FakeVideoProvider::default());
        let (clips, report) = animate_all(
            provider,
            None,
            &mut scenes,
            &layout,
            &AnimationOptions::default(),
        )
        .await;

        assert_eq!(clips.len(), 1);
        assert_eq!(report.skipped(), vec![1]);
    }

    #[tokio::test]
    async fn test_missing_frame_file_fails_scene() {
        let (_tmp, layout, mut scenes) = layout_with_frames(1);
        std::fs::remove_file(layout.frame_path(0)).unwrap();
        let provider = Arc::new(FakeVideoProvider::default());
        let (clips, report) = animate_all(
            provider,
            None,
            &mut scenes,
            &layout,
            &AnimationOptions::default(),
        )
        .await;

        assert!(clips.is_empty());
        assert!(matches!(
            report.get(0),
            Some(SceneOutcome::Failed(FailureReason::MissingInput(_)))
        ));
    }
}
