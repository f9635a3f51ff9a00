//! Generation service client and scene orchestration.
//!
//! This crate provides:
//! - A typed client for the external asynchronous generation service
//! - The submit/poll job state machine with deadline and cancellation
//! - Bounded fan-out/fan-in over scenes with index-keyed results
//! - Asset download to local files

pub mod client;
pub mod download;
pub mod error;
pub mod job;
pub mod orchestrator;

pub use client::{DreamClient, GenerationService, GenerationStatus, RemoteState};
pub use download::download_asset;
pub use error::{GenError, GenResult};
pub use job::{GenerationJob, PollConfig};
pub use orchestrator::SceneOrchestrator;
