//! CLI for StoryReel - generated ad videos.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use storyreel::config::{
    Config, DEFAULT_OUTPUT_ROOT, ELEVENLABS_API_KEY, FAL_KEY, GEMINI_API_KEY, OUTPUT_DIR_VAR,
};
use storyreel::pipeline::{resolve_resume_settings, AcquisitionObserver};
use storyreel::{
    ElevenLabsProvider, FalVideoModel, FalVideoProvider, GeminiProvider, GeminiTextProvider,
    ImageProvider, ResumeOverrides, RunRequest, RunSummary, SpeechProvider, StoryReelError,
    Studio, TextProvider, VideoProvider, DEFAULT_VOICE_ID,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "storyreel")]
#[command(about = "Generate narrated ad videos from a prompt (Gemini, ElevenLabs, fal.ai)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new run
    Generate(GenerateArgs),

    /// Redo narration, animation and composition for an existing run
    Resume(ResumeArgs),

    /// List collaborators and their configuration
    Providers(ProvidersArgs),
}

#[derive(Args)]
struct GenerateArgs {
    /// What the ad is about (defaults to the mushroom supplement ad)
    #[arg(short, long)]
    prompt: Option<String>,

    /// Number of frames to ask for
    #[arg(short = 'n', long, default_value_t = 5)]
    frames: usize,

    /// Generation attempts before settling for fewer frames
    #[arg(long, default_value_t = 5)]
    attempts: u32,

    /// ElevenLabs voice ID
    #[arg(long, default_value = DEFAULT_VOICE_ID)]
    voice_id: String,

    /// Background music: YouTube URL or ID, audio URL, or local file
    #[arg(long)]
    music: Option<String>,

    /// Background music volume, 0.0 to 1.0
    #[arg(long, default_value_t = 0.5)]
    music_volume: f32,

    /// Animate every frame into a clip (slow, needs FAL_KEY)
    #[arg(long)]
    animate: bool,

    /// fal.ai image-to-video model (veo2, luma, or a model ID)
    #[arg(long, default_value = "fal-ai/veo2/image-to-video")]
    video_model: FalVideoModel,

    /// Image whose style the frames should follow
    #[arg(long)]
    seed_image: Option<PathBuf>,

    /// Directory that holds run directories
    #[arg(long)]
    output_root: Option<PathBuf>,
}

#[derive(Args)]
struct ResumeArgs {
    /// Run directory, or any folder of frame_NNN.png files
    dir: PathBuf,

    /// ElevenLabs voice ID
    #[arg(long)]
    voice_id: Option<String>,

    /// Background music: YouTube URL or ID, audio URL, or local file
    #[arg(long)]
    music: Option<String>,

    /// Background music volume, 0.0 to 1.0
    #[arg(long)]
    music_volume: Option<f32>,

    /// Animate every frame into a clip
    #[arg(long, conflicts_with = "no_animate")]
    animate: bool,

    /// Skip animation even if the run was created with it
    #[arg(long)]
    no_animate: bool,

    /// fal.ai image-to-video model (veo2, luma, or a model ID)
    #[arg(long)]
    video_model: Option<String>,

    /// Regenerate narration even when every scene has audio
    #[arg(long)]
    renarrate: bool,
}

#[derive(Args)]
struct ProvidersArgs {
    /// Call each configured provider to verify credentials
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Generate(args) => {
            let summary = generate(args, cli.json).await?;
            print_summary(&summary, cli.json)?;
        }
        Commands::Resume(args) => {
            let summary = resume(args).await?;
            print_summary(&summary, cli.json)?;
        }
        Commands::Providers(args) => {
            list_providers(args, cli.json).await?;
        }
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("storyreel=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn generate(args: GenerateArgs, json_output: bool) -> anyhow::Result<RunSummary> {
    if let Some(seed) = &args.seed_image {
        if !seed.is_file() {
            anyhow::bail!("seed image not found: {}", seed.display());
        }
    }

    let mut config = Config::from_env()?;
    if let Some(root) = args.output_root {
        config.output_root = root;
    }
    let video_model = args.animate.then(|| args.video_model.clone());
    let observer: Arc<dyn AcquisitionObserver> = Arc::new(ProgressObserver::new(json_output)?);
    let studio = Studio::from_config(&config, video_model)?
        .observer(observer)
        .build()?;

    let request = RunRequest {
        description: args.prompt,
        target_frames: args.frames,
        max_attempts: args.attempts,
        voice_id: args.voice_id,
        music: args.music,
        music_volume: args.music_volume,
        animate: args.animate,
        video_model: args.video_model,
        seed_image: args.seed_image,
    };
    Ok(studio.generate(request).await?)
}

async fn resume(args: ResumeArgs) -> anyhow::Result<RunSummary> {
    let config = Config::from_env()?;
    let animate = match (args.animate, args.no_animate) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    };
    let overrides = ResumeOverrides {
        voice_id: args.voice_id,
        music: args.music,
        music_volume: args.music_volume,
        animate,
        video_model: args.video_model,
        renarrate: args.renarrate,
    };

    let settings = resolve_resume_settings(&args.dir, &overrides)
        .with_context(|| format!("cannot resume {}", args.dir.display()))?;
    let video_model = if settings.animate {
        Some(settings.video_model.parse::<FalVideoModel>()?)
    } else {
        None
    };

    let studio = Studio::from_config(&config, video_model)?.build()?;
    Ok(studio.resume(&args.dir, overrides).await?)
}

fn print_summary(summary: &RunSummary, json_output: bool) -> anyhow::Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("Run: {}", summary.run_dir.display());
    println!("  Frames: {} ({} scenes)", summary.frames, summary.scenes);
    if let (Some(accepted), Some(attempts)) = (summary.accepted, summary.attempts) {
        let status = if accepted { "accepted" } else { "below target" };
        println!("  Attempts: {attempts} ({status})");
    }
    if !summary.narration.is_empty() {
        println!(
            "  Narration: {} produced, {} skipped, {} failed",
            summary.narration.produced().len(),
            summary.narration.skipped().len(),
            summary.narration.failed().len()
        );
    }
    if let Some(animation) = &summary.animation {
        println!(
            "  Animation: {} produced, {} failed",
            animation.produced().len(),
            animation.failed().len()
        );
    }
    for (label, path) in [
        ("GIF", &summary.gif),
        ("Video", &summary.narrated_video),
        ("Animated video", &summary.final_video),
    ] {
        if let Some(path) = path {
            println!("  {label}: {}", path.display());
        }
    }
    Ok(())
}

async fn list_providers(args: ProvidersArgs, json_output: bool) -> anyhow::Result<()> {
    #[derive(serde::Serialize)]
    struct ProviderInfo {
        name: &'static str,
        role: &'static str,
        env_var: &'static str,
        configured: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        healthy: Option<bool>,
    }

    let is_set = |var: &str| std::env::var(var).is_ok_and(|v| !v.trim().is_empty());
    let mut providers = vec![
        ProviderInfo {
            name: "Gemini (Google)",
            role: "frames",
            env_var: GEMINI_API_KEY,
            configured: is_set(GEMINI_API_KEY),
            healthy: None,
        },
        ProviderInfo {
            name: "Gemini (Google)",
            role: "scene extraction",
            env_var: GEMINI_API_KEY,
            configured: is_set(GEMINI_API_KEY),
            healthy: None,
        },
        ProviderInfo {
            name: "ElevenLabs",
            role: "narration",
            env_var: ELEVENLABS_API_KEY,
            configured: is_set(ELEVENLABS_API_KEY),
            healthy: None,
        },
        ProviderInfo {
            name: "fal.ai",
            role: "animation",
            env_var: FAL_KEY,
            configured: is_set(FAL_KEY),
            healthy: None,
        },
    ];

    if args.check {
        let checks = health_checks().await;
        for (info, healthy) in providers.iter_mut().zip(checks) {
            info.healthy = healthy;
        }
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&providers)?);
    } else {
        println!("Collaborators:\n");
        for p in &providers {
            let status = if p.configured { "✓" } else { "✗" };
            println!("  {} {} ({})", status, p.name, p.role);
            println!("    API key: {}", p.env_var);
            if let Some(healthy) = p.healthy {
                println!("    Health: {}", if healthy { "ok" } else { "failing" });
            }
        }
        let root = std::env::var(OUTPUT_DIR_VAR).unwrap_or_else(|_| DEFAULT_OUTPUT_ROOT.into());
        println!("\nOutput root: {root} ({OUTPUT_DIR_VAR})");
    }

    Ok(())
}

/// Health of each provider in listing order; `None` when it cannot be built.
async fn health_checks() -> Vec<Option<bool>> {
    let mut results = Vec::with_capacity(4);

    results.push(match GeminiProvider::builder().build() {
        Ok(p) => Some(report(p.name(), p.health_check().await)),
        Err(_) => None,
    });
    results.push(match GeminiTextProvider::builder().build() {
        Ok(p) => Some(report("Gemini text", p.health_check().await)),
        Err(_) => None,
    });
    results.push(match ElevenLabsProvider::builder().build() {
        Ok(p) => Some(report(p.name(), p.health_check().await)),
        Err(_) => None,
    });
    results.push(match FalVideoProvider::builder().build() {
        Ok(p) => Some(report(p.name(), p.health_check().await)),
        Err(_) => None,
    });

    results
}

fn report(name: &str, result: storyreel::Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(provider = name, error = %e, "health check failed");
            false
        }
    }
}

/// Renders frame acquisition attempts as a progress bar.
struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    fn new(hidden: bool) -> anyhow::Result<Self> {
        let bar = if hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(0)
        };
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} Generating frames [{bar:30.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("##-"),
        );
        Ok(Self { bar })
    }
}

impl AcquisitionObserver for ProgressObserver {
    fn attempt_started(&self, attempt: u32, max_attempts: u32) {
        if attempt == 1 {
            self.bar
                .enable_steady_tick(std::time::Duration::from_millis(100));
        }
        self.bar.set_length(u64::from(max_attempts));
        self.bar.set_position(u64::from(attempt - 1));
        self.bar.set_message(format!("attempt {attempt}"));
    }

    fn attempt_finished(&self, attempt: u32, frames: usize, required: usize) {
        self.bar.set_position(u64::from(attempt));
        self.bar
            .set_message(format!("{frames} frames (need {required})"));
    }

    fn attempt_failed(&self, attempt: u32, error: &StoryReelError) {
        self.bar.set_position(u64::from(attempt));
        self.bar.set_message(format!("error: {error}"));
    }

    fn finished(&self, accepted: bool, frames: usize) {
        let verdict = if accepted { "accepted" } else { "kept" };
        self.bar.finish_with_message(format!("{frames} frames {verdict}"));
    }
}
