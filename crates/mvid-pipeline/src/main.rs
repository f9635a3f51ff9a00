//! Music video pipeline binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mvid_gen::DreamClient;
use mvid_models::BatchRequest;
use mvid_pipeline::{PipelineConfig, PipelineDriver};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("mvid=info".parse().expect("valid directive"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting mvid-pipeline");

    if let Err(e) = run().await {
        error!("Pipeline failed: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = PipelineConfig::from_env()?;

    let storyboard_path: PathBuf = std::env::var("STORYBOARD_PATH")
        .context("STORYBOARD_PATH is not set")?
        .into();
    let audio_path: Option<PathBuf> = std::env::var("AUDIO_PATH").ok().map(Into::into);
    let output_path: PathBuf = std::env::var("OUTPUT_PATH")
        .unwrap_or_else(|_| "music_video.mp4".to_string())
        .into();

    let request = batch_request_from_env()?;

    let storyboard = mvid_pipeline::load_storyboard(&storyboard_path)
        .await
        .with_context(|| format!("loading storyboard {}", storyboard_path.display()))?;

    let client = DreamClient::new(&config.api_base_url, &config.api_key)
        .context("creating generation client")?;
    let driver = PipelineDriver::new(Arc::new(client), config);

    let response = driver
        .run_batch(&storyboard, &request, audio_path.as_deref(), &output_path)
        .await?;

    info!(
        output = %response.output_path.display(),
        duration_secs = response.duration_secs,
        "Batch complete"
    );
    Ok(())
}

fn batch_request_from_env() -> Result<BatchRequest> {
    let mut request = BatchRequest::default();
    if let Ok(format) = std::env::var("OUTPUT_FORMAT") {
        request.format = serde_json::from_value(serde_json::Value::String(format))
            .context("OUTPUT_FORMAT must be youtube, horizontal, or vertical")?;
    }
    if let Ok(brightness) = std::env::var("BRIGHTNESS") {
        request.brightness = brightness.parse().context("BRIGHTNESS must be 0-100")?;
    }
    if let Ok(contrast) = std::env::var("CONTRAST") {
        request.contrast = contrast.parse().context("CONTRAST must be 0-100")?;
    }
    Ok(request)
}
