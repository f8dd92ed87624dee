//! On-disk layout of a run directory.
//!
//! ```text
//! run_20250101_120000/
//!   images/frame_000.png          audio/frame_000_audio.mp3
//!   videos/frame_000_animated.mp4 scenes_data.json  run.json
//!   prompt.txt  captions.txt  animation.gif  animation.mp4  final_video.mp4
//! ```
//!
//! Every per-scene file name is a pure function of the scene index.

use crate::error::{Result, StoryReelError};
use crate::pipeline::scene::SceneRecord;
use chrono::{DateTime, Local};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, TryLockError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static FRAME_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^frame_\d{3,}\.png$").expect("valid frame pattern"));

const LOCK_FILE: &str = ".storyreel.lock";

/// Paths inside one run directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    /// Wraps an existing directory without touching the filesystem.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates a fresh `run_%Y%m%d_%H%M%S` directory under `output_root`.
    ///
    /// Two runs started within the same second get `_1`, `_2`, ... suffixes.
    pub fn create(output_root: &Path, now: DateTime<Local>) -> Result<Self> {
        std::fs::create_dir_all(output_root)?;
        let base = format!("run_{}", now.format("%Y%m%d_%H%M%S"));

        let mut suffix = 0u32;
        let root = loop {
            let name = match suffix {
                0 => base.clone(),
                n => format!("{base}_{n}"),
            };
            let candidate = output_root.join(name);
            match std::fs::create_dir(&candidate) {
                Ok(()) => break candidate,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => suffix += 1,
                Err(e) => return Err(e.into()),
            }
        };

        let layout = Self { root };
        layout.ensure_dirs()?;
        tracing::info!(path = %layout.root.display(), "created run directory");
        Ok(layout)
    }

    /// Opens an existing directory for resumption. Nothing is created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let layout = Self::new(root);
        if !layout.root.is_dir() {
            return Err(StoryReelError::NotARun(layout.root));
        }
        Ok(layout)
    }

    /// True when the directory holds frames or scene records.
    pub fn is_run(&self) -> Result<bool> {
        Ok(self.scenes_path().is_file() || !self.discover_frames()?.is_empty())
    }

    /// Creates the `images/`, `audio/` and `videos/` subdirectories.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.images_dir(), self.audio_dir(), self.videos_dir()] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Run directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Frame directory.
    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    /// Narration directory.
    pub fn audio_dir(&self) -> PathBuf {
        self.root.join("audio")
    }

    /// Animated clip directory.
    pub fn videos_dir(&self) -> PathBuf {
        self.root.join("videos")
    }

    /// Scene records file.
    pub fn scenes_path(&self) -> PathBuf {
        self.root.join("scenes_data.json")
    }

    /// Run settings file.
    pub fn settings_path(&self) -> PathBuf {
        self.root.join("run.json")
    }

    /// Composed generation prompt.
    pub fn prompt_path(&self) -> PathBuf {
        self.root.join("prompt.txt")
    }

    /// Original and cleaned captions, for reference.
    pub fn captions_path(&self) -> PathBuf {
        self.root.join("captions.txt")
    }

    /// Raw LLM reply kept when it could not be parsed.
    pub fn failed_extraction_path(&self) -> PathBuf {
        self.root.join("failed_llm_extraction.txt")
    }

    /// Looping GIF of the frames.
    pub fn gif_path(&self) -> PathBuf {
        self.root.join("animation.gif")
    }

    /// Narrated stills video.
    pub fn narrated_video_path(&self) -> PathBuf {
        self.root.join("animation.mp4")
    }

    /// Narrated animated-clips video.
    pub fn final_video_path(&self) -> PathBuf {
        self.root.join("final_video.mp4")
    }

    /// Frame file for `index`.
    pub fn frame_path(&self, index: usize) -> PathBuf {
        self.images_dir().join(frame_file_name(index))
    }

    /// Narration file for `index`.
    pub fn audio_path(&self, index: usize) -> PathBuf {
        self.audio_dir().join(audio_file_name(index))
    }

    /// Animated clip for `index`.
    pub fn clip_path(&self, index: usize) -> PathBuf {
        self.videos_dir().join(clip_file_name(index))
    }

    /// Lists `frame_NNN.png` files, sorted by name.
    ///
    /// Looks in `images/` first and falls back to the run root for runs
    /// laid out flat.
    pub fn discover_frames(&self) -> Result<Vec<PathBuf>> {
        let frames = list_frames(&self.images_dir())?;
        if !frames.is_empty() {
            return Ok(frames);
        }
        list_frames(&self.root)
    }

    /// Writes the scene records, replacing the file atomically.
    pub fn save_scenes(&self, scenes: &[SceneRecord]) -> Result<()> {
        write_json_atomic(&self.root, &self.scenes_path(), &scenes)?;
        tracing::debug!(scenes = scenes.len(), "saved scene records");
        Ok(())
    }

    /// Reads the scene records, `None` when the run has none yet.
    pub fn load_scenes(&self) -> Result<Option<Vec<SceneRecord>>> {
        read_json(&self.scenes_path())
    }

    /// Writes any serializable settings value to `run.json`.
    pub fn save_settings<T: Serialize>(&self, settings: &T) -> Result<()> {
        write_json_atomic(&self.root, &self.settings_path(), settings)
    }

    /// Reads `run.json`, `None` when absent.
    pub fn load_settings<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        read_json(&self.settings_path())
    }

    /// Takes the run's exclusive lock.
    ///
    /// The lock is held by the OS on the open lock file, so a process that
    /// dies without unwinding releases it too. The file itself stays.
    pub fn lock(&self) -> Result<RunLock> {
        let path = self.root.join(LOCK_FILE);
        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => {
                return Err(StoryReelError::RunLocked(self.root.clone()));
            }
            Err(TryLockError::Error(e)) => return Err(e.into()),
        }
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        tracing::debug!(path = %path.display(), "run locked");
        Ok(RunLock { _file: file })
    }
}

/// Holds a run directory's lock; released on drop or process exit.
#[derive(Debug)]
#[must_use = "the run is unlocked as soon as the guard is dropped"]
pub struct RunLock {
    _file: File,
}

/// `frame_NNN.png`
pub fn frame_file_name(index: usize) -> String {
    format!("frame_{index:03}.png")
}

/// `frame_NNN_audio.mp3`
pub fn audio_file_name(index: usize) -> String {
    format!("frame_{index:03}_audio.mp3")
}

/// `frame_NNN_animated.mp4`
pub fn clip_file_name(index: usize) -> String {
    format!("frame_{index:03}_animated.mp4")
}

fn list_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut frames = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if entry.file_type()?.is_file() && FRAME_FILE.is_match(&name.to_string_lossy()) {
            frames.push(entry.path());
        }
    }
    frames.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(frames)
}

fn write_json_atomic<T: Serialize + ?Sized>(dir: &Path, path: &Path, value: &T) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.write_all(b"\n")?;
    tmp.persist(path).map_err(|e| StoryReelError::Io(e.error))?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
