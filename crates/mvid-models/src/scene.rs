//! Storyboard and scene definitions.
//!
//! A storyboard is the JSON document produced by the external song analysis
//! step: one song-level analysis plus an ordered list of scenes. The scene
//! index is the sole ordering key carried through every downstream stage.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One unit of the music-video concept: an image prompt and a video prompt
/// sharing an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    /// 0-based, stable ordering key
    pub index: usize,
    /// Prompt for the still-image generation job
    pub image_prompt: String,
    /// Prompt for the video generation job keyed on the image result
    pub video_prompt: String,
    /// Short setting description, used for logging only
    #[serde(default)]
    pub scene_setting: String,
}

/// Song-level analysis metadata from the external analysis step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongAnalysis {
    pub genre: String,
    /// Approximate BPM, kept as text as the analysis step reports it
    pub tempo_bpm: String,
    pub mood: String,
    pub lyrical_themes: String,
    pub instrumentation: String,
    pub artistic_style: String,
    /// Brief recurring-character description
    pub character_description: String,
}

/// The full analysis document: song metadata plus ordered scenes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Storyboard {
    pub song_analysis: SongAnalysis,
    pub scenes: Vec<Scene>,
}

/// Storyboard validation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoryboardError {
    #[error("storyboard contains no scenes")]
    Empty,

    #[error("scene at position {position} has index {index}, expected {position}")]
    NonContiguousIndex { position: usize, index: usize },
}

impl Storyboard {
    /// Validate that scene indices are contiguous 0..N in document order.
    ///
    /// Downstream stages key results by index, so a gap or duplicate would
    /// silently corrupt scene identity.
    pub fn validate(&self) -> Result<(), StoryboardError> {
        if self.scenes.is_empty() {
            return Err(StoryboardError::Empty);
        }
        for (position, scene) in self.scenes.iter().enumerate() {
            if scene.index != position {
                return Err(StoryboardError::NonContiguousIndex {
                    position,
                    index: scene.index,
                });
            }
        }
        Ok(())
    }

    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }
}
