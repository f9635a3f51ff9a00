//! Pipeline configuration.

use std::time::Duration;

use crate::error::{PipelineError, PipelineResult};

/// Default base URL for the generation service.
const DEFAULT_API_URL: &str = "https://api.lumalabs.ai/dream-machine/v1";

/// Pipeline configuration, environment-driven.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Generation service base URL
    pub api_base_url: String,
    /// Generation service API key
    pub api_key: String,
    /// Maximum concurrent generation jobs per stage
    pub max_concurrency: usize,
    /// Sleep between job status polls
    pub poll_interval: Duration,
    /// Per-job deadline for reaching a terminal state
    pub poll_timeout: Duration,
    /// Per-ffmpeg-invocation timeout during assembly
    pub ffmpeg_timeout: Duration,
    /// Root directory for per-batch working directories
    pub work_dir: String,
    /// Rescale/pad clips to a common resolution before concatenation
    pub normalize: bool,
    /// Skip failed scenes instead of aborting the batch
    pub continue_on_scene_failure: bool,
}

impl PipelineConfig {
    /// Create config from environment variables.
    ///
    /// `DREAM_API_KEY` is required; everything else has a default.
    pub fn from_env() -> PipelineResult<Self> {
        let api_key = std::env::var("DREAM_API_KEY")
            .map_err(|_| PipelineError::config("DREAM_API_KEY is not set"))?;

        Ok(Self {
            api_base_url: std::env::var("DREAM_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            api_key,
            max_concurrency: std::env::var("PIPELINE_MAX_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            poll_interval: Duration::from_secs(
                std::env::var("PIPELINE_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            ),
            poll_timeout: Duration::from_secs(
                std::env::var("PIPELINE_POLL_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            ffmpeg_timeout: Duration::from_secs(
                std::env::var("PIPELINE_FFMPEG_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            work_dir: std::env::var("PIPELINE_WORK_DIR")
                .unwrap_or_else(|_| "/tmp/mvid".to_string()),
            normalize: std::env::var("PIPELINE_NORMALIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
            continue_on_scene_failure: std::env::var("PIPELINE_CONTINUE_ON_SCENE_FAILURE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(false),
        })
    }
}
