//! Pipeline-level error type.

use thiserror::Error;

use mvid_gen::GenError;
use mvid_media::MediaError;
use mvid_models::StoryboardError;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors surfaced by the pipeline driver, naming the failed stage and,
/// for per-scene stages, the scene index.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid batch request: {0}")]
    InvalidRequest(String),

    #[error("invalid storyboard: {0}")]
    Storyboard(#[from] StoryboardError),

    #[error("image generation failed for scene {scene}: {source}")]
    ImageGeneration {
        scene: usize,
        #[source]
        source: GenError,
    },

    #[error("video generation failed for scene {scene}: {source}")]
    VideoGeneration {
        scene: usize,
        #[source]
        source: GenError,
    },

    #[error("clip download failed for scene {scene}: {source}")]
    ClipDownload {
        scene: usize,
        #[source]
        source: GenError,
    },

    #[error("assembly failed: {0}")]
    Assembly(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }
}
