//! Capture-Predict uploader
//!
//! Sends files to the inference service through the capture orchestrator
//! and prints what came back.

use anyhow::Context;
use capture_predict::{
    capture_orchestrator::CaptureOrchestrator,
    media_device::{NoMediaDevice, NoopPreview},
    models::{MediaBlob, ModelSelector, PredictionResult},
    state::AppConfig,
};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "capture-predict", version, about = "Send images or videos for object detection")]
struct Args {
    /// Model to use (new = Augmented, old = No Augment)
    #[arg(long)]
    model: Option<ModelSelector>,

    /// Inference service base URL (overrides PREDICT_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Directory to write annotated images to
    #[arg(long)]
    output: Option<PathBuf>,

    /// Files to send
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "capture_predict=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = AppConfig::from_env();
    if let Some(api_url) = args.api_url {
        if std::env::var("PREDICT_MEDIA_URL").is_err() {
            config.media_url = api_url.clone();
        }
        config.api_url = api_url;
    }
    if let Some(model) = args.model {
        config.default_model = model;
    }
    config.validate()?;

    if let Some(dir) = &args.output {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let predictor = Arc::new(config.prediction_client()?);

    tracing::info!(
        api_url = %predictor.base_url(),
        timeout_secs = predictor.timeout().as_secs(),
        model = config.default_model.as_str(),
        files = args.files.len(),
        "Starting capture-predict v{}",
        env!("CARGO_PKG_VERSION")
    );

    let orchestrator = CaptureOrchestrator::spawn(
        config.orchestrator(),
        Arc::new(NoMediaDevice),
        Arc::new(NoopPreview),
        predictor,
    );

    let mut failures = 0usize;
    for path in &args.files {
        match process_file(&orchestrator, path, args.output.as_deref()).await {
            Ok(true) => {}
            Ok(false) => failures += 1,
            Err(e) => {
                failures += 1;
                println!("{}: {:#}", path.display(), e);
            }
        }
    }

    orchestrator.shutdown().await?;

    if failures > 0 {
        anyhow::bail!("{} of {} submissions failed", failures, args.files.len());
    }
    Ok(())
}

/// Send one file. Returns whether the service produced a result.
async fn process_file(
    orchestrator: &CaptureOrchestrator,
    path: &Path,
    output: Option<&Path>,
) -> anyhow::Result<bool> {
    let blob = MediaBlob::from_path(path).await?;
    orchestrator.select_file(blob).await?;
    orchestrator.send_pending().await?;

    let state = orchestrator.wait_for(|s| !s.sending).await?;
    let result = state
        .last_result
        .context("submission finished without a result")?;

    println!("{}: {}", path.display(), result.summary());
    match &result {
        PredictionResult::ObjectImage { image_data, .. } => {
            if let Some(dir) = output {
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "prediction".to_string());
                let target = dir.join(format!("{}_predicted.png", stem));
                tokio::fs::write(&target, image_data)
                    .await
                    .with_context(|| format!("failed to write {}", target.display()))?;
                println!("  annotated image: {}", target.display());
            }
        }
        PredictionResult::VideoResult { video_url, .. } => {
            println!("  video: {}", video_url);
        }
        _ => {}
    }

    Ok(!result.is_failure())
}
