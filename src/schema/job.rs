use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Image,
    Video,
}

/// Client-observed job status. Moves forward only:
/// pending -> completed | failed, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Completed,
    Failed,
}

/// Result of a single status check against the provider.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Completed { media_url: String, media_id: String },
    Pending,
    Failed { reason: String },
    /// Ambiguous or transient provider response. Callers should keep
    /// polling; the wall-clock budget bounds how long.
    RetryableError { reason: String },
}

/// The resolved artifact of a completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedMedia {
    pub media_url: String,
    pub media_id: String,
}

/// Caller-side record of one generation job. The provider is the source of
/// truth; this record only mirrors what polling has observed so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationJob {
    pub id: Uuid,
    pub prompt_id: String,
    pub kind: JobKind,
    pub seed: Option<i64>,
    pub status: JobStatus,
    pub media_url: Option<String>,
    pub media_id: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GenerationJob {
    pub fn new(prompt_id: impl Into<String>, kind: JobKind, seed: Option<i64>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            prompt_id: prompt_id.into(),
            kind,
            seed,
            status: JobStatus::Pending,
            media_url: None,
            media_id: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, JobStatus::Completed | JobStatus::Failed)
    }

    /// Folds a poll outcome into the record. Terminal records are never
    /// touched again; pending/retryable outcomes change nothing.
    pub fn apply(&mut self, outcome: &PollOutcome) {
        if self.is_terminal() {
            return;
        }
        match outcome {
            PollOutcome::Completed {
                media_url,
                media_id,
            } => {
                self.status = JobStatus::Completed;
                self.media_url = Some(media_url.clone());
                self.media_id = Some(media_id.clone());
                self.updated_at = Utc::now();
            }
            PollOutcome::Failed { reason } => {
                self.status = JobStatus::Failed;
                self.error = Some(reason.clone());
                self.updated_at = Utc::now();
            }
            PollOutcome::Pending | PollOutcome::RetryableError { .. } => {}
        }
    }
}
