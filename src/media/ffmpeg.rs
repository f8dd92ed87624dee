//! `ffmpeg`/`ffprobe` backed compositor.

use crate::error::{Result, StoryReelError};
use crate::media::compositor::{Compositor, Retime};
use async_trait::async_trait;
use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::process::Command;

const SAMPLE_RATE: &str = "44100";

/// Drives the system `ffmpeg` and `ffprobe` binaries.
///
/// Segments are normalized to one resolution, frame rate and audio layout
/// so the concat demuxer can stream-copy them.
#[derive(Debug, Clone)]
pub struct FfmpegCompositor {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    width: u32,
    height: u32,
    fps: u32,
}

impl Default for FfmpegCompositor {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            width: 1280,
            height: 720,
            fps: 24,
        }
    }
}

impl FfmpegCompositor {
    /// Creates a compositor using binaries from `PATH` at 1280x720, 24 fps.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the binary locations.
    pub fn with_binaries(
        mut self,
        ffmpeg: impl Into<PathBuf>,
        ffprobe: impl Into<PathBuf>,
    ) -> Self {
        self.ffmpeg = ffmpeg.into();
        self.ffprobe = ffprobe.into();
        self
    }

    /// Overrides the output resolution.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    fn scale_filter(&self) -> String {
        format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps},format=yuv420p",
            w = self.width,
            h = self.height,
            fps = self.fps
        )
    }

    fn ffmpeg(&self) -> Command {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-y", "-hide_banner", "-loglevel", "error"]);
        cmd
    }

    /// Appends the narration input, or a silent source when there is none.
    fn audio_input(cmd: &mut Command, narration: Option<&Path>) {
        match narration {
            Some(path) => {
                cmd.arg("-i").arg(path);
            }
            None => {
                cmd.args(["-f", "lavfi", "-i"])
                    .arg(format!("anullsrc=r={SAMPLE_RATE}:cl=stereo"));
            }
        }
    }

    fn encode_args(cmd: &mut Command) {
        cmd.args([
            "-c:v", "libx264", "-preset", "veryfast", "-c:a", "aac", "-ar", SAMPLE_RATE, "-ac",
            "2",
        ]);
    }
}

#[async_trait]
impl Compositor for FfmpegCompositor {
    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        let mut cmd = Command::new(&self.ffprobe);
        cmd.args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(path);
        let stdout = run(cmd, "ffprobe").await?;

        let probe: ProbeOutput = serde_json::from_slice(&stdout)?;
        probe
            .format
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0)
            .ok_or_else(|| {
                StoryReelError::Media(format!("no duration reported for {}", path.display()))
            })
    }

    async fn render_still(
        &self,
        image: &Path,
        narration: Option<&Path>,
        duration: f64,
        output: &Path,
    ) -> Result<()> {
        let mut cmd = self.ffmpeg();
        cmd.args(["-loop", "1", "-i"]).arg(image);
        Self::audio_input(&mut cmd, narration);
        cmd.args(["-map", "0:v", "-map", "1:a"])
            .arg("-t")
            .arg(format!("{duration:.3}"))
            .arg("-vf")
            .arg(self.scale_filter());
        Self::encode_args(&mut cmd);
        cmd.arg(output);
        run(cmd, "ffmpeg").await?;
        Ok(())
    }

    async fn render_clip(
        &self,
        clip: &Path,
        narration: Option<&Path>,
        retime: Option<Retime>,
        output: &Path,
    ) -> Result<()> {
        let mut filter = String::new();
        if let Some(retime) = retime {
            filter.push_str(&format!("setpts={:.6}*PTS,", retime.factor()));
        }
        filter.push_str(&self.scale_filter());

        let mut cmd = self.ffmpeg();
        cmd.arg("-i").arg(clip);
        Self::audio_input(&mut cmd, narration);
        cmd.args(["-map", "0:v", "-map", "1:a", "-vf"]).arg(&filter);
        Self::encode_args(&mut cmd);
        cmd.arg("-shortest").arg(output);
        run(cmd, "ffmpeg").await?;
        Ok(())
    }

    async fn concat(&self, segments: &[&Path], output: &Path) -> Result<()> {
        if segments.is_empty() {
            return Err(StoryReelError::NoFrames);
        }

        let mut list = tempfile::Builder::new()
            .prefix("concat_")
            .suffix(".txt")
            .tempfile()?;
        for segment in segments {
            let absolute = std::path::absolute(segment)?;
            writeln!(list, "file '{}'", escape_concat_path(&absolute))?;
        }
        list.flush()?;

        let mut cmd = self.ffmpeg();
        cmd.args(["-f", "concat", "-safe", "0", "-i"])
            .arg(list.path())
            .args(["-c", "copy"])
            .arg(output);
        run(cmd, "ffmpeg").await?;
        Ok(())
    }

    async fn prepare_music(
        &self,
        music: &Path,
        duration: f64,
        volume: f32,
        output: &Path,
    ) -> Result<()> {
        let mut cmd = self.ffmpeg();
        cmd.arg("-i")
            .arg(music)
            .args(["-vn", "-t"])
            .arg(format!("{duration:.3}"))
            .arg("-af")
            .arg(format!("volume={volume:.3}"))
            .args(["-c:a", "aac", "-ar", SAMPLE_RATE, "-ac", "2"])
            .arg(output);
        run(cmd, "ffmpeg").await?;
        Ok(())
    }

    async fn mix_music(&self, video: &Path, music: &Path, output: &Path) -> Result<()> {
        let mut cmd = self.ffmpeg();
        cmd.arg("-i")
            .arg(video)
            .arg("-i")
            .arg(music)
            .args([
                "-filter_complex",
                "[0:a][1:a]amix=inputs=2:duration=first:dropout_transition=0:normalize=0[a]",
                "-map",
                "0:v",
                "-map",
                "[a]",
                "-c:v",
                "copy",
                "-c:a",
                "aac",
            ])
            .arg(output);
        run(cmd, "ffmpeg").await?;
        Ok(())
    }
}

/// Runs a prepared command and returns its stdout, mapping failures to
/// [`StoryReelError::Media`] with the tail of stderr.
pub(crate) async fn run(mut cmd: Command, program: &str) -> Result<Vec<u8>> {
    let output = cmd.kill_on_drop(true).output().await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StoryReelError::Media(format!("{program} not found on PATH"))
        } else {
            StoryReelError::Io(e)
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr
            .lines()
            .rev()
            .take(5)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join(" | ");
        return Err(StoryReelError::Media(format!(
            "{program} exited with {}: {tail}",
            output.status
        )));
    }
    Ok(output.stdout)
}

fn escape_concat_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    duration: Option<String>,
}
