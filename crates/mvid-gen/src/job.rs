//! Submit/poll state machine for one generation job.
//!
//! A job is submitted once, then polled on a fixed interval until the
//! service reports a terminal state. The poll loop always carries a
//! deadline: expiry transitions the job to `TimedOut`, which downstream
//! stages treat exactly like a failure. A cancellation signal is checked
//! on every iteration.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

use mvid_models::{GenerationId, GenerationKind, JobRecord};

use crate::client::{GenerationService, RemoteState};
use crate::error::{GenError, GenResult};

/// Default interval between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Default deadline for reaching a terminal state.
pub const DEFAULT_POLL_DEADLINE: Duration = Duration::from_secs(600);

/// Polling policy for generation jobs.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Sleep between polls
    pub interval: Duration,
    /// Total time allowed to reach a terminal state
    pub deadline: Duration,
    /// Cancellation signal, checked each iteration
    pub cancel: Option<watch::Receiver<bool>>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            deadline: DEFAULT_POLL_DEADLINE,
            cancel: None,
        }
    }
}

impl PollConfig {
    pub fn new(interval: Duration, deadline: Duration) -> Self {
        Self {
            interval,
            deadline,
            cancel: None,
        }
    }

    /// Attach a cancellation signal.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }
}

/// One asynchronous generation job, from submission to terminal state.
#[derive(Debug)]
pub struct GenerationJob {
    record: JobRecord,
    config: PollConfig,
}

impl GenerationJob {
    /// Submit an image generation job.
    pub async fn submit_image(
        service: &dyn GenerationService,
        prompt: &str,
        aspect_ratio: &str,
        config: PollConfig,
    ) -> GenResult<Self> {
        let id = service.create_image(prompt, aspect_ratio).await?;
        Ok(Self::from_submitted(id, GenerationKind::Image, config))
    }

    /// Submit a video generation job keyed on a first-frame image URL.
    pub async fn submit_video(
        service: &dyn GenerationService,
        prompt: &str,
        first_frame_url: &str,
        config: PollConfig,
    ) -> GenResult<Self> {
        let id = service.create_video(prompt, first_frame_url).await?;
        Ok(Self::from_submitted(id, GenerationKind::Video, config))
    }

    fn from_submitted(id: GenerationId, kind: GenerationKind, config: PollConfig) -> Self {
        debug!(id = %id, kind = %kind, "Generation job submitted");
        Self {
            record: JobRecord::new(id, kind),
            config,
        }
    }

    /// The job's record, including state and poll attempts.
    pub fn record(&self) -> &JobRecord {
        &self.record
    }

    pub fn id(&self) -> &GenerationId {
        &self.record.id
    }

    /// Poll until terminal. Returns the asset URL on completion.
    ///
    /// A `Failed` report ends the loop immediately with the service's
    /// failure text verbatim; deadline expiry yields `PollTimeout` and the
    /// record lands in `TimedOut`, distinct from `Failed`.
    pub async fn wait(&mut self, service: &dyn GenerationService) -> GenResult<String> {
        let started = Instant::now();

        loop {
            if self.config.is_cancelled() {
                return Err(GenError::Cancelled);
            }
            if started.elapsed() >= self.config.deadline {
                self.record.time_out();
                info!(
                    id = %self.record.id,
                    kind = %self.record.kind,
                    attempts = self.record.attempts,
                    "Generation timed out"
                );
                return Err(GenError::PollTimeout {
                    waited_secs: self.config.deadline.as_secs(),
                });
            }

            let status = service.get(&self.record.id, self.record.kind).await?;
            self.record.record_poll();

            match status.state {
                RemoteState::Completed => {
                    let url = status.asset_url.ok_or_else(|| {
                        GenError::invalid_response("completed generation without asset URL")
                    })?;
                    self.record.complete(url.clone());
                    info!(
                        id = %self.record.id,
                        kind = %self.record.kind,
                        attempts = self.record.attempts,
                        "Generation completed"
                    );
                    return Ok(url);
                }
                RemoteState::Failed => {
                    let reason = status
                        .failure_reason
                        .unwrap_or_else(|| "no failure reason provided".to_string());
                    self.record.fail(reason.clone());
                    return Err(GenError::Generation { reason });
                }
                RemoteState::Submitted | RemoteState::InProgress => {
                    debug!(
                        id = %self.record.id,
                        attempts = self.record.attempts,
                        "Generation in progress"
                    );
                    tokio::time::sleep(self.config.interval).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::GenerationStatus;
    use async_trait::async_trait;
    use mvid_models::JobState;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Service fake that replays a scripted sequence of poll states,
    /// repeating the last entry once exhausted.
    struct ScriptedService {
        script: Vec<GenerationStatus>,
        polls: AtomicUsize,
    }

    impl ScriptedService {
        fn new(script: Vec<GenerationStatus>) -> Self {
            Self {
                script,
                polls: AtomicUsize::new(0),
            }
        }

        fn poll_count(&self) -> usize {
            self.polls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerationService for ScriptedService {
        async fn create_image(&self, _prompt: &str, _aspect: &str) -> GenResult<GenerationId> {
            Ok(GenerationId::from_string("scripted"))
        }

        async fn create_video(&self, _prompt: &str, _url: &str) -> GenResult<GenerationId> {
            Ok(GenerationId::from_string("scripted"))
        }

        async fn get(
            &self,
            _id: &GenerationId,
            _kind: GenerationKind,
        ) -> GenResult<GenerationStatus> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            let idx = n.min(self.script.len() - 1);
            Ok(self.script[idx].clone())
        }

        async fn fetch_asset(&self, _url: &str, _dest: &Path) -> GenResult<()> {
            Ok(())
        }
    }

    fn in_progress() -> GenerationStatus {
        GenerationStatus {
            state: RemoteState::InProgress,
            asset_url: None,
            failure_reason: None,
        }
    }

    fn completed(url: &str) -> GenerationStatus {
        GenerationStatus {
            state: RemoteState::Completed,
            asset_url: Some(url.to_string()),
            failure_reason: None,
        }
    }

    fn failed(reason: &str) -> GenerationStatus {
        GenerationStatus {
            state: RemoteState::Failed,
            asset_url: None,
            failure_reason: Some(reason.to_string()),
        }
    }

    fn fast_config() -> PollConfig {
        PollConfig::new(Duration::from_secs(2), Duration::from_secs(60))
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_after_polling() {
        let service = ScriptedService::new(vec![
            in_progress(),
            in_progress(),
            completed("https://cdn/clip.mp4"),
        ]);

        let mut job =
            GenerationJob::submit_video(&service, "pan left", "https://cdn/img.jpg", fast_config())
                .await
                .unwrap();

        let url = job.wait(&service).await.unwrap();
        assert_eq!(url, "https://cdn/clip.mp4");
        assert_eq!(job.record().state, JobState::Completed);
        assert_eq!(job.record().attempts, 3);
        assert_eq!(job.record().result_ref.as_deref(), Some("https://cdn/clip.mp4"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_first_poll_is_terminal_without_further_polling() {
        let service = ScriptedService::new(vec![failed("nsfw content detected")]);

        let mut job = GenerationJob::submit_image(&service, "prompt", "16:9", fast_config())
            .await
            .unwrap();

        let err = job.wait(&service).await.unwrap_err();
        match err {
            GenError::Generation { reason } => assert_eq!(reason, "nsfw content detected"),
            other => panic!("expected Generation, got {other:?}"),
        }
        assert_eq!(job.record().state, JobState::Failed);
        assert_eq!(
            job.record().failure_reason.as_deref(),
            Some("nsfw content detected")
        );
        assert_eq!(service.poll_count(), 1, "must not poll past a terminal state");
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expiry_is_timed_out_not_failed() {
        let service = ScriptedService::new(vec![in_progress()]);
        let config = PollConfig::new(Duration::from_secs(2), Duration::from_secs(10));

        let mut job = GenerationJob::submit_image(&service, "prompt", "16:9", config)
            .await
            .unwrap();

        let err = job.wait(&service).await.unwrap_err();
        assert!(matches!(err, GenError::PollTimeout { waited_secs: 10 }));
        assert_eq!(job.record().state, JobState::TimedOut);
        assert_ne!(job.record().state, JobState::Failed);
        // interval 2s, deadline 10s: bounded number of polls, not infinite
        assert!(service.poll_count() <= 6, "polled {} times", service.poll_count());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_checked_each_iteration() {
        let service = ScriptedService::new(vec![in_progress()]);
        let (tx, rx) = watch::channel(false);
        let config = fast_config().with_cancel(rx);

        let mut job = GenerationJob::submit_image(&service, "prompt", "16:9", config)
            .await
            .unwrap();

        tx.send(true).unwrap();
        let err = job.wait(&service).await.unwrap_err();
        assert!(matches!(err, GenError::Cancelled));
        assert_eq!(service.poll_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_without_asset_url_is_invalid_response() {
        let service = ScriptedService::new(vec![GenerationStatus {
            state: RemoteState::Completed,
            asset_url: None,
            failure_reason: None,
        }]);

        let mut job = GenerationJob::submit_image(&service, "prompt", "16:9", fast_config())
            .await
            .unwrap();

        let err = job.wait(&service).await.unwrap_err();
        assert!(matches!(err, GenError::InvalidResponse(_)));
    }
}
