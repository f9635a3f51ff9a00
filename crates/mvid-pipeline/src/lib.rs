//! Pipeline driver, configuration, and errors for the mvid worker.

pub mod config;
pub mod driver;
pub mod error;

pub use config::PipelineConfig;
pub use driver::{load_storyboard, PipelineDriver};
pub use error::{PipelineError, PipelineResult};
