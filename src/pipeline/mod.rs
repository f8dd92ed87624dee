//! The run pipeline.
//!
//! Phases run in order, each persisting what it produced so a run can be
//! abandoned after any phase and resumed later:
//!
//! 1. [`acquire_frames`]: re-prompt the generator until enough frames arrive.
//! 2. [`extract_scenes`]: LLM scene extraction with a pattern fallback.
//! 3. [`reconcile`]: positional merge of scenes with frame files.
//! 4. [`synthesize_all`]: narration per scene plus a repair pass.
//! 5. [`animate_all`]: optional per-scene clips.
//! 6. [`compose`]: GIF, narrated stills video and animated video.
//!
//! [`Studio`] wires the phases to a set of collaborators.

mod acquire;
mod animate;
mod compose;
mod extract;
mod layout;
mod narrate;
mod reconcile;
mod report;
mod run;
mod scene;

pub use acquire::{
    acquire_frames, escalate_prompt, escalation_directive, AcceptanceThreshold, AcquiredFrames,
    AcquisitionObserver, AcquisitionPolicy,
};
pub use animate::{
    animate_all, animation_prompt, animation_prompt_request, fallback_animation_prompt,
    AnimationOptions,
};
pub use compose::{compose, compose_gif, CompositionOptions, SegmentKind};
pub use extract::{
    build_extraction_prompt, extract_scenes, extract_with_llm, extract_with_patterns,
    join_text_parts, parse_scene_json, strip_code_fence,
};
pub use layout::{audio_file_name, clip_file_name, frame_file_name, RunLayout, RunLock};
pub use narrate::{sanitize_caption, synthesize_all, NarrationOptions};
pub use reconcile::{reconcile, reconstruct};
pub use report::{BatchReport, FailureReason, SceneOutcome, SkipReason};
pub use run::{
    build_generation_prompt, merge_resume_settings, resolve_resume_settings, ResumeOverrides,
    RunRequest, RunSettings, RunSummary, Studio, StudioBuilder, DEFAULT_DESCRIPTION,
};
pub use scene::{SceneRecord, DEFAULT_SPEAKER};
