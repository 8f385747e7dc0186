//! One-shot swing analysis from the command line.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tpro_coach::{AnalysisProgress, Analyzer, GeminiClient};
use tpro_media::{FrameSampler, SamplerConfig};
use tpro_models::{SampledFrame, StrokeType};

#[derive(Parser)]
#[command(name = "tpro-analyze")]
#[command(about = "Score a tennis swing clip", long_about = None)]
struct Cli {
    /// Path to the video clip
    video: PathBuf,

    /// Declared stroke (id or label, e.g. "serve" or "Drive (Forehand)")
    #[arg(short, long, default_value = "forehand-drive")]
    stroke: StrokeType,

    /// Write the sampled frames here as frame_NN.jpg
    #[arg(long)]
    frames_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout carries only the result JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tpro=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let sampler_config = SamplerConfig::from_env();
    let service = Arc::new(GeminiClient::from_env()?);
    let analyzer = Analyzer::new(FrameSampler::ffmpeg(&sampler_config), service);

    let captured: Mutex<Vec<SampledFrame>> = Mutex::new(Vec::new());
    let outcome = analyzer
        .analyze_file(&cli.video, cli.stroke, |event| {
            if let AnalysisProgress::FramesExtracted(frames) = event {
                if let Ok(mut slot) = captured.lock() {
                    *slot = frames;
                }
            }
        })
        .await;

    if let Some(dir) = &cli.frames_dir {
        let frames = captured.into_inner().unwrap_or_default();
        write_frames(dir, &frames).await?;
    }

    let result = outcome.with_context(|| format!("analysis of {} failed", cli.video.display()))?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}

async fn write_frames(dir: &Path, frames: &[SampledFrame]) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create {}", dir.display()))?;

    for frame in frames {
        let path = dir.join(format!("frame_{:02}.jpg", frame.ordinal));
        tokio::fs::write(&path, frame.jpeg())
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    info!(count = frames.len(), dir = %dir.display(), "Wrote sampled frames");
    Ok(())
}
