//! Background music sources and volume.

use crate::error::{Result, StoryReelError};
use crate::media::ffmpeg::run;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::process::Command;

static VIDEO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("valid video id pattern"));

/// Extracts an 11-character YouTube video id from a bare id or a
/// `watch?v=`, `youtu.be/`, `/embed/` or `/shorts/` URL.
pub fn extract_youtube_id(input: &str) -> Option<String> {
    let input = input.trim();
    if VIDEO_ID.is_match(input) {
        return Some(input.to_string());
    }

    let url = reqwest::Url::parse(input).ok()?;
    let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");
    let candidate = match host {
        "youtu.be" => url.path_segments()?.next().map(str::to_string),
        "youtube.com" | "music.youtube.com" => {
            let mut segments = url.path_segments()?;
            match segments.next() {
                Some("watch") => url
                    .query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.into_owned()),
                Some("embed") | Some("shorts") | Some("v") => segments.next().map(str::to_string),
                _ => None,
            }
        }
        _ => None,
    }?;

    VIDEO_ID.is_match(&candidate).then_some(candidate)
}

/// Where background music comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum MusicSource {
    /// A YouTube video id, downloaded as audio with `yt-dlp`.
    YouTube(String),
    /// A direct `http(s)` link to an audio file.
    Url(String),
    /// A local audio file.
    File(PathBuf),
}

impl MusicSource {
    /// Interprets a user-supplied music reference.
    ///
    /// Existing local paths win over the bare-id form so a file named like
    /// a video id is not mistaken for one.
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(StoryReelError::InvalidRequest(
                "empty music reference".into(),
            ));
        }
        if Path::new(reference).exists() {
            return Ok(Self::File(PathBuf::from(reference)));
        }
        if let Some(id) = extract_youtube_id(reference) {
            return Ok(Self::YouTube(id));
        }
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return Ok(Self::Url(reference.to_string()));
        }
        Ok(Self::File(PathBuf::from(reference)))
    }
}

/// Music volume in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MusicVolume(f32);

impl MusicVolume {
    /// Volume used when none is given or the given one is out of range.
    pub const DEFAULT: Self = Self(0.5);

    /// Validates `value`, falling back to [`MusicVolume::DEFAULT`] with a warning.
    pub fn new(value: f32) -> Self {
        if (0.0..=1.0).contains(&value) {
            Self(value)
        } else {
            tracing::warn!(
                requested = value,
                fallback = Self::DEFAULT.0,
                "music volume must be between 0 and 1, using default"
            );
            Self::DEFAULT
        }
    }

    /// Returns the linear gain.
    pub fn get(&self) -> f32 {
        self.0
    }
}

impl Default for MusicVolume {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Resolves a [`MusicSource`] to a local audio file.
#[async_trait]
pub trait MusicFetcher: Send + Sync {
    /// Makes the music available on disk, downloading into `dest_dir` if needed.
    async fn fetch(&self, source: &MusicSource, dest_dir: &Path) -> Result<PathBuf>;
}

/// Downloads music with `yt-dlp` (YouTube) or plain HTTP.
#[derive(Debug, Clone)]
pub struct MusicDownloader {
    client: reqwest::Client,
    yt_dlp: PathBuf,
}

impl Default for MusicDownloader {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            yt_dlp: PathBuf::from("yt-dlp"),
        }
    }
}

impl MusicDownloader {
    /// Creates a downloader using `yt-dlp` from `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the `yt-dlp` binary location.
    pub fn with_yt_dlp(mut self, path: impl Into<PathBuf>) -> Self {
        self.yt_dlp = path.into();
        self
    }

    async fn download_youtube(&self, id: &str, dest_dir: &Path) -> Result<PathBuf> {
        let template = dest_dir.join("background_music.%(ext)s");
        let mut cmd = Command::new(&self.yt_dlp);
        cmd.args(["-x", "--audio-format", "mp3", "--audio-quality", "0", "-o"])
            .arg(&template)
            .arg(format!("https://www.youtube.com/watch?v={id}"));
        run(cmd, "yt-dlp").await?;

        let path = dest_dir.join("background_music.mp3");
        if !path.exists() {
            return Err(StoryReelError::Media(format!(
                "yt-dlp finished but {} is missing",
                path.display()
            )));
        }
        Ok(path)
    }

    async fn download_url(&self, url: &str, dest_dir: &Path) -> Result<PathBuf> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(StoryReelError::Api {
                status: response.status().as_u16(),
                message: "Failed to download music".into(),
            });
        }

        let ext = Path::new(response.url().path())
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| e.len() <= 4)
            .unwrap_or("mp3")
            .to_string();
        let bytes = response.bytes().await?;
        let path = dest_dir.join(format!("background_music.{ext}"));
        tokio::fs::write(&path, &bytes).await?;
        Ok(path)
    }
}

#[async_trait]
impl MusicFetcher for MusicDownloader {
    async fn fetch(&self, source: &MusicSource, dest_dir: &Path) -> Result<PathBuf> {
        tracing::info!(?source, "fetching background music");
        match source {
            MusicSource::YouTube(id) => self.download_youtube(id, dest_dir).await,
            MusicSource::Url(url) => self.download_url(url, dest_dir).await,
            MusicSource::File(path) if path.is_file() => Ok(path.clone()),
            MusicSource::File(path) => Err(StoryReelError::Media(format!(
                "music file not found: {}",
                path.display()
            ))),
        }
    }
}
