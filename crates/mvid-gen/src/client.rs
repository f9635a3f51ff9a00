//! Client for the external asynchronous generation service.
//!
//! The service exposes a Dream-Machine-shaped REST API: create calls return
//! a generation id immediately, and `GET /generations/{id}` is polled until
//! the generation reaches a terminal state.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use mvid_models::{GenerationId, GenerationKind};

use crate::download::download_asset;
use crate::error::{GenError, GenResult};

/// Image generation model.
const IMAGE_MODEL: &str = "photon-1";
/// Video generation model.
const VIDEO_MODEL: &str = "ray-flash-2";
/// Clip length requested per scene.
const CLIP_DURATION: &str = "5s";

/// Remote generation state as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteState {
    Submitted,
    Completed,
    Failed,
    /// Any in-flight state the service reports while working
    #[serde(other)]
    InProgress,
}

impl RemoteState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RemoteState::Completed | RemoteState::Failed)
    }
}

/// One poll's view of a generation.
#[derive(Debug, Clone)]
pub struct GenerationStatus {
    pub state: RemoteState,
    /// Asset URL, present on `Completed`
    pub asset_url: Option<String>,
    /// Failure text, present on `Failed`
    pub failure_reason: Option<String>,
}

/// Contract with the external generation service.
///
/// One client is constructed per pipeline run and shared read-only across
/// concurrent jobs; implementations must be safe for concurrent use.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Submit an image generation. Returns the new job's id.
    async fn create_image(&self, prompt: &str, aspect_ratio: &str) -> GenResult<GenerationId>;

    /// Submit a video generation keyed on a first-frame image URL.
    async fn create_video(&self, prompt: &str, first_frame_url: &str) -> GenResult<GenerationId>;

    /// Fetch the current state of a generation.
    async fn get(&self, id: &GenerationId, kind: GenerationKind) -> GenResult<GenerationStatus>;

    /// Download a completed asset to a local file.
    async fn fetch_asset(&self, url: &str, dest: &Path) -> GenResult<()>;
}

#[derive(Debug, Serialize)]
struct CreateImageRequest<'a> {
    prompt: &'a str,
    aspect_ratio: &'a str,
    model: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateVideoRequest<'a> {
    prompt: &'a str,
    model: &'a str,
    duration: &'a str,
    keyframes: Keyframes<'a>,
}

#[derive(Debug, Serialize)]
struct Keyframes<'a> {
    frame0: Keyframe<'a>,
}

#[derive(Debug, Serialize)]
struct Keyframe<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GetResponse {
    state: RemoteState,
    #[serde(default)]
    assets: Option<Assets>,
    #[serde(default)]
    failure_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Assets {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    video: Option<String>,
}

/// Reqwest-backed client for the generation service.
#[derive(Debug, Clone)]
pub struct DreamClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl DreamClient {
    /// Create a client against `base_url` with a bearer `api_key`.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> GenResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn submit<B: Serialize>(&self, path: &str, body: &B) -> GenResult<GenerationId> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| GenError::submission(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenError::submission(format!(
                "service returned {status}: {body}"
            )));
        }

        let created: CreateResponse = response
            .json()
            .await
            .map_err(|e| GenError::invalid_response(format!("malformed create response: {e}")))?;

        debug!(id = %created.id, "Generation submitted");
        Ok(GenerationId::from_string(created.id))
    }
}

#[async_trait]
impl GenerationService for DreamClient {
    async fn create_image(&self, prompt: &str, aspect_ratio: &str) -> GenResult<GenerationId> {
        let body = CreateImageRequest {
            prompt,
            aspect_ratio,
            model: IMAGE_MODEL,
        };
        self.submit("/generations/image", &body).await
    }

    async fn create_video(&self, prompt: &str, first_frame_url: &str) -> GenResult<GenerationId> {
        let body = CreateVideoRequest {
            prompt,
            model: VIDEO_MODEL,
            duration: CLIP_DURATION,
            keyframes: Keyframes {
                frame0: Keyframe {
                    kind: "image",
                    url: first_frame_url,
                },
            },
        };
        self.submit("/generations", &body).await
    }

    async fn get(&self, id: &GenerationId, kind: GenerationKind) -> GenResult<GenerationStatus> {
        let response = self
            .client
            .get(self.url(&format!("/generations/{}", id.as_str())))
            .bearer_auth(&self.api_key)
            .send()
            .await?
            .error_for_status()?;

        let status: GetResponse = response
            .json()
            .await
            .map_err(|e| GenError::invalid_response(format!("malformed get response: {e}")))?;

        let assets = status.assets.unwrap_or_default();
        let asset_url = match kind {
            GenerationKind::Image => assets.image,
            GenerationKind::Video => assets.video,
        };

        Ok(GenerationStatus {
            state: status.state,
            asset_url,
            failure_reason: status.failure_reason,
        })
    }

    async fn fetch_asset(&self, url: &str, dest: &Path) -> GenResult<()> {
        download_asset(&self.client, url, dest).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_create_image_submits_model_and_aspect() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generations/image"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "photon-1",
                "aspect_ratio": "16:9",
            })))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({ "id": "gen-123", "state": "submitted" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = DreamClient::new(server.uri(), "test-key").unwrap();
        let id = client.create_image("a garden", "16:9").await.unwrap();
        assert_eq!(id.as_str(), "gen-123");
    }

    #[tokio::test]
    async fn test_create_video_sends_first_frame_keyframe() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generations"))
            .and(body_partial_json(serde_json::json!({
                "model": "ray-flash-2",
                "duration": "5s",
                "keyframes": { "frame0": { "type": "image", "url": "https://cdn/img.jpg" } },
            })))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({ "id": "gen-456", "state": "submitted" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = DreamClient::new(server.uri(), "test-key").unwrap();
        let id = client
            .create_video("camera pans", "https://cdn/img.jpg")
            .await
            .unwrap();
        assert_eq!(id.as_str(), "gen-456");
    }

    #[tokio::test]
    async fn test_rejected_create_is_submission_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generations/image"))
            .respond_with(ResponseTemplate::new(400).set_body_string("prompt rejected"))
            .mount(&server)
            .await;

        let client = DreamClient::new(server.uri(), "test-key").unwrap();
        let err = client.create_image("bad", "16:9").await.unwrap_err();
        match err {
            GenError::Submission { message } => {
                assert!(message.contains("prompt rejected"), "message: {message}")
            }
            other => panic!("expected Submission, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_maps_completed_asset_by_kind() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/generations/gen-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "gen-123",
                "state": "completed",
                "assets": { "image": "https://cdn/img.jpg", "video": "https://cdn/clip.mp4" },
            })))
            .mount(&server)
            .await;

        let client = DreamClient::new(server.uri(), "test-key").unwrap();
        let id = GenerationId::from_string("gen-123");

        let status = client.get(&id, GenerationKind::Image).await.unwrap();
        assert_eq!(status.state, RemoteState::Completed);
        assert_eq!(status.asset_url.as_deref(), Some("https://cdn/img.jpg"));

        let status = client.get(&id, GenerationKind::Video).await.unwrap();
        assert_eq!(status.asset_url.as_deref(), Some("https://cdn/clip.mp4"));
    }

    #[tokio::test]
    async fn test_get_surfaces_failure_reason_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/generations/gen-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "gen-9",
                "state": "failed",
                "failure_reason": "content policy: flagged term",
            })))
            .mount(&server)
            .await;

        let client = DreamClient::new(server.uri(), "test-key").unwrap();
        let status = client
            .get(&GenerationId::from_string("gen-9"), GenerationKind::Image)
            .await
            .unwrap();
        assert_eq!(status.state, RemoteState::Failed);
        assert_eq!(
            status.failure_reason.as_deref(),
            Some("content policy: flagged term")
        );
    }

    #[tokio::test]
    async fn test_unknown_state_is_in_progress() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/generations/gen-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "gen-2",
                "state": "dreaming",
            })))
            .mount(&server)
            .await;

        let client = DreamClient::new(server.uri(), "test-key").unwrap();
        let status = client
            .get(&GenerationId::from_string("gen-2"), GenerationKind::Video)
            .await
            .unwrap();
        assert_eq!(status.state, RemoteState::InProgress);
        assert!(!status.state.is_terminal());
    }
}
