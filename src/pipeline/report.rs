//! Per-scene outcomes for the phases that tolerate partial failure.

use serde::Serialize;
use std::collections::BTreeMap;

/// Why a scene needed no work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Caption is empty, so there is nothing to narrate.
    EmptyCaption,
    /// Scene has no frame, so there is nothing to animate.
    NoImage,
}

/// Why a scene's work failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum FailureReason {
    /// The remote collaborator returned an error.
    #[error("provider error: {0}")]
    Provider(String),
    /// Writing the result to disk failed.
    #[error("I/O error: {0}")]
    Io(String),
    /// Expected input file was missing.
    #[error("missing input: {0}")]
    MissingInput(String),
    /// The worker task panicked or was cancelled.
    #[error("task aborted: {0}")]
    Aborted(String),
}

impl From<crate::error::StoryReelError> for FailureReason {
    fn from(err: crate::error::StoryReelError) -> Self {
        match err {
            crate::error::StoryReelError::Io(e) => Self::Io(e.to_string()),
            other => Self::Provider(other.to_string()),
        }
    }
}

/// Result of processing one scene.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum SceneOutcome<T> {
    /// Work succeeded.
    Produced(T),
    /// Work did not apply to this scene.
    Skipped(SkipReason),
    /// Work was attempted and failed.
    Failed(FailureReason),
}

impl<T> SceneOutcome<T> {
    /// True for [`SceneOutcome::Produced`].
    pub fn is_produced(&self) -> bool {
        matches!(self, Self::Produced(_))
    }

    /// True for [`SceneOutcome::Failed`].
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Outcomes keyed by scene index.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BatchReport<T> {
    outcomes: BTreeMap<usize, SceneOutcome<T>>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self {
            outcomes: BTreeMap::new(),
        }
    }
}

impl<T> BatchReport<T> {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome for `index`, replacing any earlier one.
    pub fn record(&mut self, index: usize, outcome: SceneOutcome<T>) {
        self.outcomes.insert(index, outcome);
    }

    /// Outcome for `index`.
    pub fn get(&self, index: usize) -> Option<&SceneOutcome<T>> {
        self.outcomes.get(&index)
    }

    /// Outcomes in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &SceneOutcome<T>)> {
        self.outcomes.iter().map(|(i, o)| (*i, o))
    }

    /// Number of scenes reported.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// True when nothing was reported.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Indices that produced a result.
    pub fn produced(&self) -> Vec<usize> {
        self.indices(SceneOutcome::is_produced)
    }

    /// Indices that failed.
    pub fn failed(&self) -> Vec<usize> {
        self.indices(SceneOutcome::is_failed)
    }

    /// Indices skipped as not applicable.
    pub fn skipped(&self) -> Vec<usize> {
        self.indices(|o| matches!(o, SceneOutcome::Skipped(_)))
    }

    fn indices(&self, pred: impl Fn(&SceneOutcome<T>) -> bool) -> Vec<usize> {
        self.outcomes
            .iter()
            .filter(|(_, o)| pred(o))
            .map(|(i, _)| *i)
            .collect()
    }
}
