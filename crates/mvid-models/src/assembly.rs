//! Assembly request: ordered clips plus audio and adjustment parameters.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::batch::NEUTRAL_ADJUSTMENT;

/// Everything the assembly engine needs for one batch.
///
/// Constructed once after all video jobs complete and consumed exactly once.
/// `ordered_clip_paths` must already be in scene index order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyRequest {
    /// Clip files in scene index order
    pub ordered_clip_paths: Vec<PathBuf>,
    /// Optional audio track; if the file is missing the batch proceeds
    /// without audio
    pub audio_path: Option<PathBuf>,
    /// Rescale/pad every clip to the first clip's resolution before concat
    pub normalize: bool,
    /// 0-100, 50 neutral
    pub brightness: u8,
    /// 0-100, 50 neutral
    pub contrast: u8,
}

impl AssemblyRequest {
    pub fn new(ordered_clip_paths: Vec<PathBuf>) -> Self {
        Self {
            ordered_clip_paths,
            audio_path: None,
            normalize: true,
            brightness: NEUTRAL_ADJUSTMENT,
            contrast: NEUTRAL_ADJUSTMENT,
        }
    }

    pub fn with_audio(mut self, audio_path: impl Into<PathBuf>) -> Self {
        self.audio_path = Some(audio_path.into());
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn with_color(mut self, brightness: u8, contrast: u8) -> Self {
        self.brightness = brightness;
        self.contrast = contrast;
        self
    }

    /// True when both sliders sit at the neutral midpoint, in which case
    /// the color-adjustment pass is a no-op and is skipped entirely.
    pub fn is_color_neutral(&self) -> bool {
        self.brightness == NEUTRAL_ADJUSTMENT && self.contrast == NEUTRAL_ADJUSTMENT
    }
}
