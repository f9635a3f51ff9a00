//! Assembly of ordered scene clips into one finished video.
//!
//! Pipeline per call: validate/probe every clip, optionally normalize each
//! clip to the first clip's resolution, concatenate in index order, apply
//! the color-adjustment pass (skipped at neutral), apply fade in/out, then
//! trim and mux the audio track. Every intermediate lives in one `TempDir`
//! scoped to the call; the destination only ever sees a complete file.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::fs;
use tracing::{debug, info};

use mvid_models::{AssemblyRequest, EncodingConfig};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{audio_trim_filter, eq_filter, fade_filter, normalize_filter};
use crate::probe::{probe_video, VideoInfo};

/// Escape a path for an ffmpeg concat list entry.
///
/// The concat demuxer wraps paths in single quotes; a literal quote inside
/// the path must be written as `'\''`.
fn concat_list_entry(path: &Path) -> String {
    let escaped = path.to_string_lossy().replace('\'', "'\\''");
    format!("file '{escaped}'")
}

/// Assembles ordered clips plus an audio track into one output file.
pub struct AssemblyEngine {
    encoding: EncodingConfig,
    runner: FfmpegRunner,
}

impl Default for AssemblyEngine {
    fn default() -> Self {
        Self::new(EncodingConfig::default())
    }
}

impl AssemblyEngine {
    pub fn new(encoding: EncodingConfig) -> Self {
        Self {
            encoding,
            runner: FfmpegRunner::new(),
        }
    }

    /// Cap each ffmpeg invocation at `secs`.
    pub fn with_pass_timeout(mut self, secs: u64) -> Self {
        self.runner = FfmpegRunner::new().with_timeout(secs);
        self
    }

    /// Run the full assembly, writing the finished video to `output_path`.
    ///
    /// Returns the output duration in seconds. On any failure nothing is
    /// written at `output_path` and all intermediates are removed.
    pub async fn assemble(
        &self,
        request: &AssemblyRequest,
        output_path: &Path,
    ) -> MediaResult<f64> {
        let infos = self.validate(request).await?;

        let scratch = TempDir::new()?;
        info!(
            clips = request.ordered_clip_paths.len(),
            normalize = request.normalize,
            "Starting assembly"
        );

        let clips = if request.normalize {
            self.normalize(request, &infos, scratch.path()).await?
        } else {
            request.ordered_clip_paths.clone()
        };

        let concatenated = self.concat(&clips, scratch.path()).await?;
        let adjusted = self.color_adjust(request, &concatenated, scratch.path()).await?;
        let (faded, duration) = self.fade(&adjusted, scratch.path()).await?;
        let finished = self.mux_audio(request, &faded, duration, scratch.path()).await?;

        self.emit(&finished, output_path).await?;
        info!(
            output = %output_path.display(),
            duration_secs = duration,
            "Assembly complete"
        );
        Ok(duration)
    }

    /// Probe every clip up front. Missing or unreadable clips fail the
    /// batch before any transcoding starts.
    async fn validate(&self, request: &AssemblyRequest) -> MediaResult<Vec<VideoInfo>> {
        if request.ordered_clip_paths.is_empty() {
            return Err(MediaError::invalid_video("assembly requires at least one clip"));
        }

        let mut infos = Vec::with_capacity(request.ordered_clip_paths.len());
        for path in &request.ordered_clip_paths {
            if !path.exists() {
                return Err(MediaError::FileNotFound(path.clone()));
            }
            let info = probe_video(path).await?;
            debug!(
                clip = %path.display(),
                width = info.width,
                height = info.height,
                duration = info.duration,
                "Validated clip"
            );
            infos.push(info);
        }
        Ok(infos)
    }

    /// Rescale/pad clips to the first clip's resolution. Clips already at
    /// the target pass through untouched.
    async fn normalize(
        &self,
        request: &AssemblyRequest,
        infos: &[VideoInfo],
        scratch: &Path,
    ) -> MediaResult<Vec<PathBuf>> {
        let target_w = infos[0].width;
        let target_h = infos[0].height;

        let mut normalized = Vec::with_capacity(request.ordered_clip_paths.len());
        for (i, (path, info)) in request
            .ordered_clip_paths
            .iter()
            .zip(infos)
            .enumerate()
        {
            if info.width == target_w && info.height == target_h {
                normalized.push(path.clone());
                continue;
            }

            let dest = scratch.join(format!("normalized_{i}.mp4"));
            debug!(
                clip = %path.display(),
                from = format!("{}x{}", info.width, info.height),
                to = format!("{target_w}x{target_h}"),
                "Normalizing clip"
            );

            let cmd = FfmpegCommand::new(&dest)
                .input(path)
                .video_filter(normalize_filter(target_w, target_h))
                .video_codec(&self.encoding.video_codec)
                .preset(&self.encoding.preset)
                .crf(self.encoding.crf)
                .audio_codec(&self.encoding.audio_codec)
                .audio_bitrate(&self.encoding.audio_bitrate);
            self.runner.run(&cmd).await?;
            normalized.push(dest);
        }
        Ok(normalized)
    }

    /// Stream-level concatenation via the concat demuxer.
    async fn concat(&self, clips: &[PathBuf], scratch: &Path) -> MediaResult<PathBuf> {
        let list_path = scratch.join("concat_list.txt");
        let mut list = String::new();
        for clip in clips {
            let absolute = if clip.is_absolute() {
                clip.clone()
            } else {
                std::env::current_dir()?.join(clip)
            };
            list.push_str(&concat_list_entry(&absolute));
            list.push('\n');
        }
        fs::write(&list_path, list).await?;

        let dest = scratch.join("concatenated.mp4");
        let cmd = FfmpegCommand::new(&dest)
            .input_with_args(["-f", "concat", "-safe", "0"], &list_path)
            .output_args(["-c", "copy"]);
        self.runner.run(&cmd).await?;
        Ok(dest)
    }

    /// Single eq pass over the concatenated intermediate. Neutral sliders
    /// skip the pass entirely.
    async fn color_adjust(
        &self,
        request: &AssemblyRequest,
        input: &Path,
        scratch: &Path,
    ) -> MediaResult<PathBuf> {
        let Some(filter) = eq_filter(request.brightness, request.contrast) else {
            debug!("Neutral color settings, skipping adjustment pass");
            return Ok(input.to_path_buf());
        };

        debug!(filter = %filter, "Applying color adjustment");
        let dest = scratch.join("adjusted.mp4");
        let cmd = FfmpegCommand::new(&dest)
            .input(input)
            .video_filter(filter)
            .video_codec(&self.encoding.video_codec)
            .preset(&self.encoding.preset)
            .crf(self.encoding.crf)
            .output_args(["-c:a", "copy"]);
        self.runner.run(&cmd).await?;
        Ok(dest)
    }

    /// Fade in over the first second and out over the last, re-probing the
    /// intermediate for its total duration.
    async fn fade(&self, input: &Path, scratch: &Path) -> MediaResult<(PathBuf, f64)> {
        let duration = probe_video(input).await?.duration;

        let dest = scratch.join("faded.mp4");
        let cmd = FfmpegCommand::new(&dest)
            .input(input)
            .video_filter(fade_filter(duration))
            .video_codec(&self.encoding.video_codec)
            .preset(&self.encoding.preset)
            .crf(self.encoding.crf)
            .output_args(["-c:a", "copy"]);
        self.runner.run(&cmd).await?;
        Ok((dest, duration))
    }

    /// Trim the audio track to the video duration and mux it in, copying
    /// the video stream. A missing audio file is not an error.
    async fn mux_audio(
        &self,
        request: &AssemblyRequest,
        video: &Path,
        video_duration: f64,
        scratch: &Path,
    ) -> MediaResult<PathBuf> {
        let Some(audio) = request.audio_path.as_deref() else {
            return Ok(video.to_path_buf());
        };
        if !audio.exists() {
            info!(audio = %audio.display(), "Audio file missing, assembling without audio");
            return Ok(video.to_path_buf());
        }

        debug!(audio = %audio.display(), trim_to = video_duration, "Muxing audio");
        let dest = scratch.join("muxed.mp4");
        let cmd = FfmpegCommand::new(&dest)
            .input(video)
            .input(audio)
            .filter_complex(audio_trim_filter(video_duration))
            .map("0:v")
            .map("[aout]")
            .video_codec("copy")
            .audio_codec(&self.encoding.audio_codec)
            .audio_bitrate(&self.encoding.audio_bitrate);
        self.runner.run(&cmd).await?;
        Ok(dest)
    }

    /// Move the finished file into place, creating the output directory.
    ///
    /// The destination only ever receives a complete file: a rename where
    /// possible, otherwise a copy staged beside the destination and renamed
    /// once fully written.
    async fn emit(&self, finished: &Path, output_path: &Path) -> MediaResult<()> {
        if let Some(parent) = output_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }
        if fs::rename(finished, output_path).await.is_ok() {
            return Ok(());
        }

        // rename fails across filesystems; stage the copy in the
        // destination directory so the final rename is same-filesystem
        let staging = output_path.with_extension("part");
        if let Err(e) = fs::copy(finished, &staging).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&staging, output_path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }
        Ok(())
    }
}
