//! Shared data models for the mvid backend.
//!
//! This crate provides Serde-serializable types for:
//! - Storyboards and scenes produced by the song analysis step
//! - Generation job records and their states
//! - Output formats and batch requests
//! - Assembly requests and encoding configuration

pub mod assembly;
pub mod batch;
pub mod encoding;
pub mod format;
pub mod generation;
pub mod scene;

// Re-export common types
pub use assembly::AssemblyRequest;
pub use batch::{BatchRequest, BatchResponse, NEUTRAL_ADJUSTMENT};
pub use encoding::EncodingConfig;
pub use format::OutputFormat;
pub use generation::{GenerationId, GenerationKind, JobRecord, JobState, SceneResult};
pub use scene::{Scene, SongAnalysis, Storyboard, StoryboardError};
