//! Error types for video generation runs.

use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

/// Maximum length of an upstream error body kept in an error message.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

static SECRET_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)((?:api[_-]?)?key=)[^&\s"']+"#).expect("valid secret pattern")
});

/// Errors that can occur while producing a run.
#[derive(Debug, thiserror::Error)]
pub enum StoryReelError {
    /// API key missing or invalid.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Required configuration is missing.
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingConfig(Vec<String>),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limit exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// Operation timed out (e.g., video queue polling).
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Account has no credit left.
    #[error("billing issue: {0}")]
    Billing(String),

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Response did not have the expected shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode base64 or image data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// I/O error (e.g., saving a frame).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image decoding or encoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Video generation specific error.
    #[error("video generation failed: {0}")]
    VideoGeneration(String),

    /// Local media toolchain (ffmpeg, ffprobe, yt-dlp) failed.
    #[error("media toolchain error: {0}")]
    Media(String),

    /// The frame generator kept failing until the attempt budget ran out.
    #[error("frame acquisition failed after {attempts} attempt(s) (prompt: {prompt:?}): {source}")]
    AcquisitionFailed {
        attempts: u32,
        prompt: String,
        #[source]
        source: Box<StoryReelError>,
    },

    /// Nothing usable came out of generation, so there is nothing to compose.
    #[error("no frames or clips were produced")]
    NoFrames,

    /// Another invocation currently owns the run directory.
    #[error("run directory {} is in use by another invocation", .0.display())]
    RunLocked(PathBuf),

    /// Directory does not contain a run.
    #[error("not a run directory: {}", .0.display())]
    NotARun(PathBuf),
}

impl StoryReelError {
    /// Returns true if this error is likely transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Timeout(_) | Self::Network(_)
        )
    }

    /// Returns the suggested retry delay, if available.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            Self::Timeout(_) => Some(Duration::from_secs(1)),
            Self::Network(_) => Some(Duration::from_secs(2)),
            _ => None,
        }
    }
}

/// Result type alias for run operations.
pub type Result<T> = std::result::Result<T, StoryReelError>;

/// Trims an upstream error body and redacts anything that looks like a key parameter.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let redacted = SECRET_PARAM.replace_all(text.trim(), "${1}[REDACTED]");
    if redacted.chars().count() <= MAX_ERROR_MESSAGE_LEN {
        return redacted.into_owned();
    }
    let truncated: String = redacted.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
    format!("{truncated}...")
}

/// Reads a `Retry-After` header expressed in whole seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(StoryReelError::RateLimited { retry_after: None }.is_retryable());
        assert!(StoryReelError::Timeout(Duration::from_secs(30)).is_retryable());

        assert!(!StoryReelError::Auth("bad key".into()).is_retryable());
        assert!(!StoryReelError::ContentBlocked("nsfw".into()).is_retryable());
        assert!(!StoryReelError::NoFrames.is_retryable());
        assert!(!StoryReelError::Decode("bad base64".into()).is_retryable());
    }

    #[test]
    fn test_retry_after() {
        let rate_limited = StoryReelError::RateLimited {
            retry_after: Some(Duration::from_secs(60)),
        };
        assert_eq!(rate_limited.retry_after(), Some(Duration::from_secs(60)));

        let timeout = StoryReelError::Timeout(Duration::from_secs(30));
        assert_eq!(timeout.retry_after(), Some(Duration::from_secs(1)));

        assert_eq!(StoryReelError::Auth("bad".into()).retry_after(), None);
    }

    #[test]
    fn test_error_display() {
        let err = StoryReelError::Api {
            status: 404,
            message: "Not found".into(),
        };
        assert_eq!(err.to_string(), "API error: 404 - Not found");

        let err = StoryReelError::MissingConfig(vec!["GEMINI_API_KEY".into(), "FAL_KEY".into()]);
        assert_eq!(
            err.to_string(),
            "missing required environment variables: GEMINI_API_KEY, FAL_KEY"
        );
    }

    #[test]
    fn test_acquisition_failure_keeps_context() {
        let err = StoryReelError::AcquisitionFailed {
            attempts: 5,
            prompt: "a mushroom ad".into(),
            source: Box::new(StoryReelError::Timeout(Duration::from_secs(10))),
        };
        let text = err.to_string();
        assert!(text.contains("5 attempt(s)"));
        assert!(text.contains("a mushroom ad"));
        assert!(text.contains("timed out"));
    }

    #[test]
    fn test_sanitize_redacts_keys() {
        let msg = sanitize_error_message("bad request for https://x.test/v1?key=abc123&alt=json");
        assert!(msg.contains("key=[REDACTED]"));
        assert!(!msg.contains("abc123"));
    }

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let long = "x".repeat(2000);
        let msg = sanitize_error_message(&long);
        assert_eq!(msg.len(), MAX_ERROR_MESSAGE_LEN + 3);
        assert!(msg.ends_with("..."));
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = reqwest::header::HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert(reqwest::header::RETRY_AFTER, "12".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(12));
    }
}
