//! FFmpeg/FFprobe subprocess wrapper and the assembly engine.

pub mod assemble;
pub mod command;
pub mod error;
pub mod filters;
pub mod probe;

pub use assemble::AssemblyEngine;
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use probe::{probe_duration, probe_video, VideoInfo};
