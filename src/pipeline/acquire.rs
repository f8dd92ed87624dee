//! Frame acquisition: re-prompt the generator until it returns enough frames.
//!
//! The generator decides how many image parts to return. Each attempt that
//! comes back short appends a firmer directive to the prompt; directives
//! accumulate across attempts. When the budget runs out the last response
//! is used as-is. Transport errors are retried within the same budget, and
//! an error on the final attempt is returned with the prompt and attempt
//! count attached.

use crate::error::{Result, StoryReelError};
use crate::image::{GeneratedImage, GenerationRequest, ImageProvider};
use std::time::Duration;

/// Minimum frame count a response needs to be accepted.
///
/// The requirement is `max(minimum, ceil(ratio * target))`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcceptanceThreshold {
    /// Fraction of the target that must arrive.
    pub ratio: f64,
    /// Floor on the requirement.
    pub minimum: usize,
}

impl Default for AcceptanceThreshold {
    fn default() -> Self {
        Self {
            ratio: 0.75,
            minimum: 2,
        }
    }
}

impl AcceptanceThreshold {
    /// Accepts any response with at least two frames.
    pub fn more_than_one() -> Self {
        Self {
            ratio: 0.0,
            minimum: 2,
        }
    }

    /// Frames required for `target`.
    pub fn required(&self, target: usize) -> usize {
        let scaled = (self.ratio * target as f64).ceil();
        let scaled = if scaled.is_finite() && scaled > 0.0 {
            scaled as usize
        } else {
            0
        };
        scaled.max(self.minimum)
    }

    /// True when `frames` satisfies the threshold for `target`.
    pub fn accepts(&self, frames: usize, target: usize) -> bool {
        frames >= self.required(target)
    }
}

/// Knobs for [`acquire_frames`].
#[derive(Debug, Clone)]
pub struct AcquisitionPolicy {
    /// Frames asked for.
    pub target_frames: usize,
    /// Generation calls allowed, errors included.
    pub max_attempts: u32,
    /// When a response counts as good enough.
    pub threshold: AcceptanceThreshold,
    /// Wait after a short response.
    pub retry_delay: Duration,
    /// Wait after a failed call.
    pub error_delay: Duration,
}

impl Default for AcquisitionPolicy {
    fn default() -> Self {
        Self {
            target_frames: 5,
            max_attempts: 5,
            threshold: AcceptanceThreshold::default(),
            retry_delay: Duration::from_secs(2),
            error_delay: Duration::from_secs(3),
        }
    }
}

impl AcquisitionPolicy {
    /// Default policy for `target_frames` frames.
    pub fn for_target(target_frames: usize) -> Self {
        Self {
            target_frames,
            ..Self::default()
        }
    }
}

/// Directive appended after a short response on `attempt` (1-based).
pub fn escalation_directive(attempt: u32, target: usize) -> String {
    match attempt {
        0 | 1 => format!("IMPORTANT: I need EXACTLY {target} distinct image frames, not fewer."),
        2 => format!(
            "CRITICAL: Please generate {target} separate images. Each image should be a different scene in the sequence."
        ),
        _ => format!(
            "FINAL REQUEST: Generate {target} images showing different scenes. Each image must be a separate frame."
        ),
    }
}

/// Returns `prompt` with the directive for `attempt` appended.
pub fn escalate_prompt(prompt: &str, attempt: u32, target: usize) -> String {
    format!("{prompt}\n\n{}", escalation_directive(attempt, target))
}

/// Receives progress from [`acquire_frames`]. Purely informational.
pub trait AcquisitionObserver: Send + Sync {
    /// An attempt is about to call the generator.
    fn attempt_started(&self, _attempt: u32, _max_attempts: u32) {}

    /// An attempt returned `frames` frames.
    fn attempt_finished(&self, _attempt: u32, _frames: usize, _required: usize) {}

    /// An attempt's call failed.
    fn attempt_failed(&self, _attempt: u32, _error: &StoryReelError) {}

    /// Acquisition is over.
    fn finished(&self, _accepted: bool, _frames: usize) {}
}

impl AcquisitionObserver for () {}

/// Frames and text returned by the attempt that ended acquisition.
#[derive(Debug, Clone)]
pub struct AcquiredFrames {
    /// Image parts in response order.
    pub images: Vec<GeneratedImage>,
    /// Text parts in response order.
    pub texts: Vec<String>,
    /// Attempts used.
    pub attempts: u32,
    /// False when the budget ran out before the threshold was met.
    pub accepted: bool,
    /// Prompt sent on the final attempt, directives included.
    pub final_prompt: String,
}

/// Calls `provider` until a response meets the policy's threshold or the
/// attempt budget is spent.
pub async fn acquire_frames(
    provider: &dyn ImageProvider,
    prompt: &str,
    seed_image: Option<&[u8]>,
    policy: &AcquisitionPolicy,
    observer: &dyn AcquisitionObserver,
) -> Result<AcquiredFrames> {
    let max_attempts = policy.max_attempts.max(1);
    let required = policy.threshold.required(policy.target_frames);
    let mut current_prompt = prompt.to_string();

    for attempt in 1..=max_attempts {
        observer.attempt_started(attempt, max_attempts);
        tracing::info!(attempt, max_attempts, "requesting frames");

        let mut request = GenerationRequest::new(current_prompt.clone());
        if let Some(seed) = seed_image {
            request = request.with_seed_image(seed.to_vec());
        }

        let response = match provider.generate(&request).await {
            Ok(response) => response,
            Err(e) if attempt < max_attempts => {
                tracing::warn!(attempt, error = %e, "frame generation failed, retrying");
                observer.attempt_failed(attempt, &e);
                tokio::time::sleep(policy.error_delay).await;
                continue;
            }
            Err(e) => {
                observer.attempt_failed(attempt, &e);
                return Err(StoryReelError::AcquisitionFailed {
                    attempts: attempt,
                    prompt: current_prompt,
                    source: Box::new(e),
                });
            }
        };

        let frames = response.frame_count();
        observer.attempt_finished(attempt, frames, required);
        let accepted = frames >= required;

        if accepted || attempt == max_attempts {
            if accepted {
                tracing::info!(attempt, frames, required, "frame count accepted");
            } else {
                tracing::warn!(
                    attempt,
                    frames,
                    required,
                    "attempt budget spent, keeping last response"
                );
            }
            observer.finished(accepted, frames);
            return Ok(AcquiredFrames {
                images: response.images,
                texts: response.texts,
                attempts: attempt,
                accepted,
                final_prompt: current_prompt,
            });
        }

        tracing::info!(
            attempt,
            frames,
            required,
            target = policy.target_frames,
            "too few frames, escalating prompt"
        );
        current_prompt = escalate_prompt(&current_prompt, attempt, policy.target_frames);
        tokio::time::sleep(policy.retry_delay).await;
    }

    // max_attempts >= 1, so the final iteration always returns
    Err(StoryReelError::NoFrames)
}
