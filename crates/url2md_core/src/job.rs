use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type JobId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// `Completed` and `Failed` accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single URL conversion and everything known about its outcome.
///
/// Once the status is terminal exactly one of `markdown` / `error_message`
/// is set, and `completed_at` is set iff the status is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionJob {
    pub id: JobId,
    pub url: String,
    pub include_images: bool,
    pub clean_html: bool,
    pub status: JobStatus,
    pub markdown: Option<String>,
    pub title: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ConversionJob {
    pub fn new(
        url: impl Into<String>,
        include_images: bool,
        clean_html: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            include_images,
            clean_html,
            status: JobStatus::Pending,
            markdown: None,
            title: None,
            error_message: None,
            created_at,
            completed_at: None,
        }
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id,
            url: self.url.clone(),
            status: self.status,
            title: self.title.clone(),
            created_at: self.created_at,
            completed_at: self.completed_at,
        }
    }
}

/// Listing view of a job, without the (potentially large) markdown body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: JobId,
    pub url: String,
    pub status: JobStatus,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
