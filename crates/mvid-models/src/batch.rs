//! Batch request/response shapes at the HTTP boundary.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

use crate::OutputFormat;

/// Neutral midpoint for brightness/contrast sliders.
pub const NEUTRAL_ADJUSTMENT: u8 = 50;

/// Options accepted for one batch run.
///
/// Brightness and contrast are UI slider values in 0-100 with 50 neutral;
/// the media layer maps them into ffmpeg's native ranges.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BatchRequest {
    #[serde(default)]
    pub format: OutputFormat,

    #[serde(default = "default_adjustment")]
    #[validate(range(min = 0, max = 100))]
    pub brightness: u8,

    #[serde(default = "default_adjustment")]
    #[validate(range(min = 0, max = 100))]
    pub contrast: u8,
}

fn default_adjustment() -> u8 {
    NEUTRAL_ADJUSTMENT
}

impl Default for BatchRequest {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            brightness: NEUTRAL_ADJUSTMENT,
            contrast: NEUTRAL_ADJUSTMENT,
        }
    }
}

/// Outcome of a batch run: the assembled output file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    pub output_path: PathBuf,
    /// Total duration of the assembled video in seconds, when known
    pub duration_secs: Option<f64>,
}
