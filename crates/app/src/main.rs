use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{Parser, Subcommand};
use maskcam_core::{
    AppConfig, FrameOutcome, Landmark, LandmarkPoint, LandmarkRegistry, OverlayCompositor,
    RecordingSession, RenderLoop, SpriteStore, UploadPipeline,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> maskcam_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::from_json_file(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Overlay {
            frame,
            landmarks,
            mask,
            output,
            scale,
            offset,
        } => run_overlay(config, &frame, &landmarks, &mask, &output, scale, offset),
        Commands::Upload {
            input,
            mask,
            output,
            endpoint,
        } => run_upload(config, &input, mask, &output, endpoint).await,
    }
}

fn run_overlay(
    config: AppConfig,
    frame: &Path,
    landmarks: &Path,
    mask: &str,
    output: &Path,
    scale: Option<f64>,
    offset: Option<f64>,
) -> maskcam_core::Result<()> {
    tracing::info!(?frame, ?landmarks, mask, "compositing overlay");

    let registry = LandmarkRegistry::face_mesh(config.detector.landmark_count)?;
    let named: HashMap<Landmark, LandmarkPoint> =
        serde_json::from_str(&std::fs::read_to_string(landmarks)?)?;
    let named: Vec<_> = named.into_iter().collect();
    let points = registry.dense_from_named(&named);

    let mut style = config.overlay.style;
    if let Some(scale) = scale {
        style.scale_multiplier = scale;
    }
    if let Some(offset) = offset {
        style.vertical_offset = offset;
    }

    let mut render = RenderLoop::new(
        OverlayCompositor::new(registry),
        SpriteStore::new(config.assets.clone()),
        style,
    );
    render.set_debug_markers(false);
    render.set_mask(mask)?;

    let image = image::open(frame)?.to_rgba8();
    match render.render_frame(&image, Some(points.as_slice())) {
        FrameOutcome::Overlaid(placement) => tracing::info!(?placement, "overlay placed"),
        outcome => tracing::warn!(?outcome, "no overlay drawn"),
    }
    render.canvas().pixels().save(output)?;
    Ok(())
}

async fn run_upload(
    mut config: AppConfig,
    input: &Path,
    mask: Option<String>,
    output: &Path,
    endpoint: Option<String>,
) -> maskcam_core::Result<()> {
    if let Some(endpoint) = endpoint {
        config.upload.endpoint = endpoint;
    }
    tracing::info!(?input, endpoint = %config.upload.endpoint, "uploading recording");

    let mut session = RecordingSession::new(mask);
    session.push_chunk(tokio::fs::read(input).await?.into());
    session.finalize();

    let pipeline = UploadPipeline::http(config.upload)?;
    let media = pipeline.upload(Arc::new(session)).await?;
    tracing::info!(
        bytes = media.bytes.len(),
        media_type = %media.media_type,
        "writing playable media"
    );
    tokio::fs::write(output, &media.bytes).await?;
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Face mask overlay and recording tools", long_about = None)]
struct Cli {
    /// JSON configuration file; defaults are used when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Composite a mask onto a still frame using named landmarks.
    Overlay {
        /// Input frame (PNG).
        frame: PathBuf,
        /// JSON object mapping landmark names (`leftEye`, ...) to `{x, y}`.
        landmarks: PathBuf,
        /// Mask key to draw.
        #[arg(short, long, default_value = "bear")]
        mask: String,
        /// Where to write the composited PNG.
        #[arg(short, long)]
        output: PathBuf,
        /// Overrides the configured scale multiplier.
        #[arg(long)]
        scale: Option<f64>,
        /// Overrides the configured vertical offset.
        #[arg(long, allow_hyphen_values = true)]
        offset: Option<f64>,
    },
    /// Send a recorded file to the re-encoding service.
    Upload {
        /// Recorded container (e.g. WebM).
        input: PathBuf,
        /// Overlay key sent alongside the recording.
        #[arg(short, long)]
        mask: Option<String>,
        /// Where to write the returned media.
        #[arg(short, long)]
        output: PathBuf,
        /// Overrides the configured service endpoint.
        #[arg(long)]
        endpoint: Option<String>,
    },
}
