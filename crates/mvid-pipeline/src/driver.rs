//! Pipeline driver: storyboard in, finished music video out.
//!
//! Stages run strictly in sequence: image generation, video generation
//! keyed on the image results, clip download, assembly. Within the two
//! generation stages scenes run concurrently under the orchestrator's
//! limit. The baseline aborts the batch on the first scene failure;
//! `continue_on_scene_failure` trades that for partial delivery.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use mvid_gen::{GenResult, GenerationJob, GenerationService, PollConfig, SceneOrchestrator};
use mvid_media::AssemblyEngine;
use mvid_models::{
    AssemblyRequest, BatchRequest, BatchResponse, EncodingConfig, OutputFormat, SceneResult,
    Storyboard,
};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};

/// Load and parse a storyboard JSON document.
pub async fn load_storyboard(path: &Path) -> PipelineResult<Storyboard> {
    let raw = fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}

/// Per-scene stages, used to attribute failures.
#[derive(Debug, Clone, Copy)]
enum Stage {
    Image,
    Video,
    Download,
}

impl Stage {
    fn error(self, scene: usize, source: mvid_gen::GenError) -> PipelineError {
        match self {
            Stage::Image => PipelineError::ImageGeneration { scene, source },
            Stage::Video => PipelineError::VideoGeneration { scene, source },
            Stage::Download => PipelineError::ClipDownload { scene, source },
        }
    }

    fn name(self) -> &'static str {
        match self {
            Stage::Image => "image",
            Stage::Video => "video",
            Stage::Download => "download",
        }
    }
}

/// Drives a full batch through generation and assembly.
pub struct PipelineDriver {
    service: Arc<dyn GenerationService>,
    orchestrator: SceneOrchestrator,
    engine: AssemblyEngine,
    config: PipelineConfig,
}

impl PipelineDriver {
    pub fn new(service: Arc<dyn GenerationService>, config: PipelineConfig) -> Self {
        let orchestrator = SceneOrchestrator::new(config.max_concurrency);
        let engine = AssemblyEngine::new(EncodingConfig::default())
            .with_pass_timeout(config.ffmpeg_timeout.as_secs());
        Self {
            service,
            orchestrator,
            engine,
            config,
        }
    }

    fn poll_config(&self) -> PollConfig {
        PollConfig::new(self.config.poll_interval, self.config.poll_timeout)
    }

    /// Run one batch end to end, writing the finished video to
    /// `output_path`.
    pub async fn run_batch(
        &self,
        storyboard: &Storyboard,
        request: &BatchRequest,
        audio_path: Option<&Path>,
        output_path: &Path,
    ) -> PipelineResult<BatchResponse> {
        request
            .validate()
            .map_err(|e| PipelineError::invalid_request(e.to_string()))?;
        storyboard.validate()?;

        let batch_id = Uuid::new_v4();
        let batch_dir = PathBuf::from(&self.config.work_dir).join(format!("batch-{batch_id}"));
        fs::create_dir_all(&batch_dir).await?;

        info!(
            batch_id = %batch_id,
            scenes = storyboard.scenes.len(),
            format = %request.format,
            "Starting batch"
        );

        let result = self
            .run_stages(storyboard, request, audio_path, output_path, &batch_dir)
            .await;

        // working directory goes away on every exit path
        if let Err(e) = fs::remove_dir_all(&batch_dir).await {
            warn!(dir = %batch_dir.display(), error = %e, "Failed to remove batch directory");
        }

        result
    }

    async fn run_stages(
        &self,
        storyboard: &Storyboard,
        request: &BatchRequest,
        audio_path: Option<&Path>,
        output_path: &Path,
        batch_dir: &Path,
    ) -> PipelineResult<BatchResponse> {
        let scene_results = self
            .generate_clips(storyboard, request.format, batch_dir)
            .await?;

        let ordered_clip_paths: Vec<PathBuf> = scene_results
            .iter()
            .filter_map(|r| r.video_clip_path.clone())
            .collect();

        let mut assembly = AssemblyRequest::new(ordered_clip_paths)
            .with_normalize(self.config.normalize)
            .with_color(request.brightness, request.contrast);
        if let Some(audio) = audio_path {
            assembly = assembly.with_audio(audio);
        }

        let duration = self.engine.assemble(&assembly, output_path).await?;

        Ok(BatchResponse {
            output_path: output_path.to_path_buf(),
            duration_secs: Some(duration),
        })
    }

    /// Run the image stage, the video stage keyed on its results, and the
    /// clip downloads. Returns one `SceneResult` per surviving scene, in
    /// scene index order.
    pub async fn generate_clips(
        &self,
        storyboard: &Storyboard,
        format: OutputFormat,
        batch_dir: &Path,
    ) -> PipelineResult<Vec<SceneResult>> {
        let aspect_ratio = format.aspect_ratio();

        // Stage 1: still images.
        let inputs: Vec<(usize, String)> = storyboard
            .scenes
            .iter()
            .map(|s| (s.index, s.image_prompt.clone()))
            .collect();
        let results = self
            .orchestrator
            .run(inputs, |index, prompt| {
                let service = Arc::clone(&self.service);
                let poll = self.poll_config();
                async move {
                    let mut job =
                        GenerationJob::submit_image(service.as_ref(), &prompt, aspect_ratio, poll)
                            .await?;
                    info!(scene = index, job_id = %job.id(), "Image job submitted");
                    job.wait(service.as_ref()).await
                }
            })
            .await;
        let image_urls = self.collect_stage(results, Stage::Image)?;

        // Stage 2: video clips, each keyed on its scene's image.
        let inputs: Vec<(usize, (String, String))> = image_urls
            .iter()
            .map(|(index, url)| {
                let scene = &storyboard.scenes[*index];
                (*index, (scene.video_prompt.clone(), url.clone()))
            })
            .collect();
        let results = self
            .orchestrator
            .run(inputs, |index, (prompt, image_url)| {
                let service = Arc::clone(&self.service);
                let poll = self.poll_config();
                async move {
                    let mut job =
                        GenerationJob::submit_video(service.as_ref(), &prompt, &image_url, poll)
                            .await?;
                    info!(scene = index, job_id = %job.id(), "Video job submitted");
                    job.wait(service.as_ref()).await
                }
            })
            .await;
        let clip_urls = self.collect_stage(results, Stage::Video)?;

        // Stage 3: download clips into the batch directory.
        let clips_dir = batch_dir.join("clips");
        fs::create_dir_all(&clips_dir).await?;

        let mut scene_results = Vec::with_capacity(clip_urls.len());
        for (index, clip_url) in &clip_urls {
            let dest = clips_dir.join(format!("clip_{index:03}.mp4"));
            match self.service.fetch_asset(clip_url, &dest).await {
                Ok(()) => scene_results.push(SceneResult {
                    index: *index,
                    image_ref: image_urls.get(index).cloned(),
                    video_clip_path: Some(dest),
                }),
                Err(e) if self.config.continue_on_scene_failure => {
                    warn!(scene = index, error = %e, "Skipping scene, clip download failed");
                }
                Err(e) => return Err(Stage::Download.error(*index, e)),
            }
        }

        if scene_results.is_empty() {
            return Err(PipelineError::invalid_request(
                "no scene produced a clip".to_string(),
            ));
        }
        Ok(scene_results)
    }

    /// Fan-in policy for one stage: abort on the first failed scene, or
    /// drop failed scenes when partial delivery is enabled.
    fn collect_stage<T>(
        &self,
        results: BTreeMap<usize, GenResult<T>>,
        stage: Stage,
    ) -> PipelineResult<BTreeMap<usize, T>> {
        let mut survivors = BTreeMap::new();
        let mut first_failure: Option<PipelineError> = None;

        for (index, result) in results {
            match result {
                Ok(value) => {
                    survivors.insert(index, value);
                }
                Err(e) => {
                    if !self.config.continue_on_scene_failure {
                        return Err(stage.error(index, e));
                    }
                    warn!(
                        scene = index,
                        stage = stage.name(),
                        error = %e,
                        "Skipping failed scene"
                    );
                    if first_failure.is_none() {
                        first_failure = Some(stage.error(index, e));
                    }
                }
            }
        }

        if survivors.is_empty() {
            if let Some(failure) = first_failure {
                return Err(failure);
            }
        }
        Ok(survivors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mvid_gen::{GenError, GenerationStatus, RemoteState};
    use mvid_models::{GenerationId, GenerationKind, Scene, SongAnalysis};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Instant-success service; image or video jobs for listed scene
    /// prompts fail at the poll step instead.
    struct InstantService {
        failing_prompts: Vec<String>,
        submissions: AtomicUsize,
    }

    impl InstantService {
        fn new() -> Self {
            Self {
                failing_prompts: Vec::new(),
                submissions: AtomicUsize::new(0),
            }
        }

        fn failing(prompts: &[&str]) -> Self {
            Self {
                failing_prompts: prompts.iter().map(|s| s.to_string()).collect(),
                submissions: AtomicUsize::new(0),
            }
        }

        fn id_for(&self, prompt: &str) -> GenerationId {
            let n = self.submissions.fetch_add(1, Ordering::SeqCst);
            if self.failing_prompts.iter().any(|p| p == prompt) {
                GenerationId::from_string(format!("fail-{n}"))
            } else {
                GenerationId::from_string(format!("ok-{n}"))
            }
        }
    }

    #[async_trait]
    impl GenerationService for InstantService {
        async fn create_image(&self, prompt: &str, _aspect: &str) -> GenResult<GenerationId> {
            Ok(self.id_for(prompt))
        }

        async fn create_video(&self, prompt: &str, _url: &str) -> GenResult<GenerationId> {
            Ok(self.id_for(prompt))
        }

        async fn get(
            &self,
            id: &GenerationId,
            kind: GenerationKind,
        ) -> GenResult<GenerationStatus> {
            if id.as_str().starts_with("fail-") {
                return Ok(GenerationStatus {
                    state: RemoteState::Failed,
                    asset_url: None,
                    failure_reason: Some("scripted failure".to_string()),
                });
            }
            let url = match kind {
                GenerationKind::Image => format!("https://cdn/{}.jpg", id.as_str()),
                GenerationKind::Video => format!("https://cdn/{}.mp4", id.as_str()),
            };
            Ok(GenerationStatus {
                state: RemoteState::Completed,
                asset_url: Some(url),
                failure_reason: None,
            })
        }

        async fn fetch_asset(&self, _url: &str, dest: &Path) -> GenResult<()> {
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(dest, b"clip")?;
            Ok(())
        }
    }

    fn storyboard(n: usize) -> Storyboard {
        Storyboard {
            song_analysis: SongAnalysis::default(),
            scenes: (0..n)
                .map(|index| Scene {
                    index,
                    image_prompt: format!("image prompt {index}"),
                    video_prompt: format!("video prompt {index}"),
                    scene_setting: String::new(),
                })
                .collect(),
        }
    }

    fn config(continue_on_failure: bool) -> PipelineConfig {
        PipelineConfig {
            api_base_url: "http://unused".to_string(),
            api_key: "k".to_string(),
            max_concurrency: 5,
            poll_interval: Duration::from_millis(1),
            poll_timeout: Duration::from_secs(10),
            ffmpeg_timeout: Duration::from_secs(10),
            work_dir: "/tmp/mvid-test".to_string(),
            normalize: true,
            continue_on_scene_failure: continue_on_failure,
        }
    }

    #[tokio::test]
    async fn test_generate_clips_yields_ordered_results() {
        let driver = PipelineDriver::new(Arc::new(InstantService::new()), config(false));
        let dir = tempfile::tempdir().unwrap();

        let results = driver
            .generate_clips(&storyboard(4), OutputFormat::Youtube, dir.path())
            .await
            .unwrap();

        assert_eq!(results.len(), 4);
        for (position, result) in results.iter().enumerate() {
            assert_eq!(result.index, position);
            assert!(result.image_ref.is_some());
            let clip = result.video_clip_path.as_ref().unwrap();
            assert!(clip.exists());
            assert!(clip
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with(&format!("clip_{position:03}")));
        }
    }

    #[tokio::test]
    async fn test_scene_failure_aborts_batch_naming_scene() {
        let service = InstantService::failing(&["image prompt 2"]);
        let driver = PipelineDriver::new(Arc::new(service), config(false));
        let dir = tempfile::tempdir().unwrap();

        let err = driver
            .generate_clips(&storyboard(4), OutputFormat::Youtube, dir.path())
            .await
            .unwrap_err();

        match err {
            PipelineError::ImageGeneration { scene, source } => {
                assert_eq!(scene, 2);
                assert!(matches!(source, GenError::Generation { .. }));
            }
            other => panic!("expected ImageGeneration, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_continue_on_scene_failure_skips_failed_scene() {
        let service = InstantService::failing(&["video prompt 1"]);
        let driver = PipelineDriver::new(Arc::new(service), config(true));
        let dir = tempfile::tempdir().unwrap();

        let results = driver
            .generate_clips(&storyboard(3), OutputFormat::Vertical, dir.path())
            .await
            .unwrap();

        let indices: Vec<usize> = results.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 2]);
    }

    #[tokio::test]
    async fn test_all_scenes_failing_is_an_error_even_when_skipping() {
        let service = InstantService::failing(&["image prompt 0", "image prompt 1"]);
        let driver = PipelineDriver::new(Arc::new(service), config(true));
        let dir = tempfile::tempdir().unwrap();

        let err = driver
            .generate_clips(&storyboard(2), OutputFormat::Youtube, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ImageGeneration { scene: 0, .. }));
    }

    #[tokio::test]
    async fn test_load_storyboard_reads_analysis_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("music_video_storyboard.json");
        let doc = serde_json::to_string(&storyboard(2)).unwrap();
        std::fs::write(&path, doc).unwrap();

        let board = load_storyboard(&path).await.unwrap();
        assert_eq!(board.scenes.len(), 2);
        assert!(board.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_storyboard_surfaces_parse_and_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();

        let err = load_storyboard(&path).await.unwrap_err();
        assert!(matches!(err, PipelineError::Json(_)));

        let err = load_storyboard(&dir.path().join("absent.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }

    #[tokio::test]
    async fn test_empty_storyboard_rejected_before_any_submission() {
        let driver = PipelineDriver::new(Arc::new(InstantService::new()), config(false));
        let empty = Storyboard {
            song_analysis: SongAnalysis::default(),
            scenes: Vec::new(),
        };
        let dir = tempfile::tempdir().unwrap();

        let err = driver
            .run_batch(
                &empty,
                &BatchRequest::default(),
                None,
                &dir.path().join("out.mp4"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Storyboard(_)));
    }
}
