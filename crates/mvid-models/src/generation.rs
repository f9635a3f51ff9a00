//! Generation job records and per-scene results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Opaque identifier assigned by the external generation service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationId(pub String);

impl GenerationId {
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of asset a generation job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    Image,
    Video,
}

impl fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationKind::Image => write!(f, "image"),
            GenerationKind::Video => write!(f, "video"),
        }
    }
}

/// Generation job state.
///
/// Transitions are monotonic: `Submitted -> Polling -> terminal`, and a
/// terminal state is never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Create call accepted by the service
    #[default]
    Submitted,
    /// Waiting for the service to reach a terminal state
    Polling,
    /// Asset is ready
    Completed,
    /// Service reported failure
    Failed,
    /// No terminal state within the configured deadline
    TimedOut,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Submitted => "submitted",
            JobState::Polling => "polling",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::TimedOut => "timed_out",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::TimedOut
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Record of one asynchronous generation job.
///
/// Owned exclusively by the orchestration stage that created it and
/// discarded once its result has been consumed by the next stage.
/// Invariant: `result_ref` is set if and only if state is `Completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: GenerationId,
    pub kind: GenerationKind,
    pub state: JobState,
    /// Asset URL/handle, present exactly when `state == Completed`
    pub result_ref: Option<String>,
    /// Service-provided failure text, verbatim
    pub failure_reason: Option<String>,
    /// Number of poll round trips performed
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(id: GenerationId, kind: GenerationKind) -> Self {
        Self {
            id,
            kind,
            state: JobState::Submitted,
            result_ref: None,
            failure_reason: None,
            attempts: 0,
            created_at: Utc::now(),
        }
    }

    /// Record one poll round trip. No-op once terminal.
    pub fn record_poll(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.state = JobState::Polling;
        self.attempts += 1;
    }

    /// Transition to `Completed` with the asset reference.
    /// Ignored if already terminal.
    pub fn complete(&mut self, result_ref: impl Into<String>) {
        if self.state.is_terminal() {
            return;
        }
        self.state = JobState::Completed;
        self.result_ref = Some(result_ref.into());
    }

    /// Transition to `Failed`, keeping the service's reason verbatim.
    /// Ignored if already terminal.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.state.is_terminal() {
            return;
        }
        self.state = JobState::Failed;
        self.failure_reason = Some(reason.into());
    }

    /// Transition to `TimedOut`. Ignored if already terminal.
    pub fn time_out(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.state = JobState::TimedOut;
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Per-scene results accumulated as stages complete, keyed by scene index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneResult {
    pub index: usize,
    /// Image URL from the first generation stage
    pub image_ref: Option<String>,
    /// Local clip path from the second stage
    pub video_clip_path: Option<PathBuf>,
}
