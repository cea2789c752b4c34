// src/main.rs
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::{info, warn};
use retouch::models::{Media, VideoFrame, VideoMetadata};
use retouch::services::video::VideoEnhancer;
use retouch::services::{DryRunInpainter, DryRunModel, ModelClient, Orchestrator};
use retouch::config::BackendSettings;
use retouch::{EnhancementConfig, EnhancementState};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Runs the enhancement pipeline locally against the dry-run backends.
#[derive(Parser, Debug)]
#[command(name = "retouch", version)]
struct Cli {
    /// Route mask-suitable edits to the instruction editor even when
    /// RETOUCH_INPAINTING_MODEL and RETOUCH_INPAINTING_ENDPOINT are set.
    #[arg(long, global = true)]
    no_inpainting: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Enhance one photo, then apply any feedback in order.
    Enhance {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long)]
        feedback: Vec<String>,
        /// Where to write the final state as JSON.
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Group extracted frames into scenes and enhance one frame per scene.
    Video {
        frames: Vec<PathBuf>,
        #[arg(long, default_value_t = 30.0)]
        frame_rate: f64,
        #[arg(short, long)]
        output_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = Cli::parse();
    let config = EnhancementConfig::from_env()?;

    let client = build_client(&config.backend, cli.no_inpainting);
    info!(
        "Starting retouch with {} (inpainting {})",
        client.multimodal_name(),
        if client.supports_inpainting() { "on" } else { "off" }
    );
    let orchestrator = Arc::new(Orchestrator::new(client));

    match cli.command {
        Command::Enhance {
            input,
            output,
            feedback,
            state,
        } => enhance(&orchestrator, &config, &input, output, &feedback, state).await,
        Command::Video {
            frames,
            frame_rate,
            output_dir,
        } => video(orchestrator, &config, &frames, frame_rate, &output_dir).await,
    }
}

/// Dry-run backends named after the configured models. Inpainting is attached
/// only when both its model and endpoint are set and the flag allows it.
fn build_client(backend: &BackendSettings, no_inpainting: bool) -> ModelClient {
    let client = ModelClient::new(Arc::new(DryRunModel::named(backend.multimodal_model.clone())));
    match backend.inpainting_model.as_deref() {
        Some(model) if backend.inpainting_configured() && !no_inpainting => {
            client.with_inpainting(Arc::new(DryRunInpainter::named(model)))
        }
        _ => {
            if backend.inpainting_configured() {
                info!("Inpainting disabled by --no-inpainting");
            }
            client
        }
    }
}

async fn enhance(
    orchestrator: &Orchestrator,
    config: &EnhancementConfig,
    input: &Path,
    output: Option<PathBuf>,
    feedback: &[String],
    state_path: Option<PathBuf>,
) -> Result<()> {
    let media = read_media(input)?;

    let mut state = match orchestrator.run_full_enhancement(media, 0, 0, config).await {
        Ok(state) => state,
        Err(failure) => {
            if let Some(path) = &state_path {
                write_state(path, &failure.state)?;
            }
            return Err(failure.into());
        }
    };

    for text in feedback {
        let outcome = orchestrator.revise(&mut state, text).await?;
        if !outcome.entry.success {
            warn!("Feedback {:?} not applied: {}", text, outcome.entry.model_response);
        }
    }

    let output = output.unwrap_or_else(|| output_path_for(input, &state.current.mime_type));
    std::fs::write(&output, &state.current.data)
        .with_context(|| format!("writing {}", output.display()))?;
    info!(
        "Wrote {} ({} inpainted, {} instruction edits, stop reason {:?})",
        output.display(),
        state.imagen_edits,
        state.instruction_edits,
        state.stop_reason
    );

    if let Some(path) = &state_path {
        write_state(path, &state)?;
    }
    Ok(())
}

async fn video(
    orchestrator: Arc<Orchestrator>,
    config: &EnhancementConfig,
    paths: &[PathBuf],
    frame_rate: f64,
    output_dir: &Path,
) -> Result<()> {
    if paths.is_empty() {
        bail!("no frames given");
    }
    if frame_rate <= 0.0 {
        bail!("frame rate must be positive, got {}", frame_rate);
    }

    let frames = paths
        .iter()
        .enumerate()
        .map(|(index, path)| {
            Ok(VideoFrame {
                index,
                timestamp_secs: index as f64 / frame_rate,
                media: read_media(path)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let (width, height) = orchestrator
        .client()
        .media()
        .probe_dimensions(&frames[0].media.data)?;
    let metadata = VideoMetadata {
        frame_rate,
        duration_secs: frames.len() as f64 / frame_rate,
        width,
        height,
    };

    let result = VideoEnhancer::new(orchestrator)
        .run_video_enhancement(&frames, &metadata, config)
        .await?;

    std::fs::create_dir_all(output_dir)?;
    for (scene_index, scene) in result.scenes.iter().enumerate() {
        match &scene.outcome {
            Ok(state) => {
                let path = output_dir.join(format!("scene-{:03}.png", scene_index));
                std::fs::write(&path, &state.current.data)?;
                info!(
                    "Scene {} ({} frames from {:.2}s) -> {}",
                    scene_index,
                    scene.group.frame_indices.len(),
                    scene.group.start_secs,
                    path.display()
                );
            }
            Err(failure) => warn!("Scene {} failed: {}", scene_index, failure),
        }
    }
    info!(
        "{} of {} scenes enhanced",
        result.completed(),
        result.scenes.len()
    );
    Ok(())
}

fn read_media(path: &Path) -> Result<Media> {
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(Media::new(data, mime_for_path(path)))
}

fn write_state(path: &Path, state: &EnhancementState) -> Result<()> {
    let json = serde_json::to_string_pretty(state)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        _ => "application/octet-stream",
    }
}

fn output_path_for(input: &Path, mime: &str) -> PathBuf {
    let ext = match mime {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        _ => "png",
    };
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    input.with_file_name(format!("{}.retouched.{}", stem, ext))
}
