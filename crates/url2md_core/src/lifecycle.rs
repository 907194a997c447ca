use chrono::{DateTime, Utc};

use crate::{ConversionJob, JobId, JobStatus};

/// Something that happened to a conversion and moves it through its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// The fetch/extract/render pipeline picked the job up.
    Started,
    /// The pipeline produced markdown.
    Completed { markdown: String, title: String },
    /// The pipeline gave up.
    Failed { message: String },
}

impl JobEvent {
    fn target(&self) -> JobStatus {
        match self {
            JobEvent::Started => JobStatus::Processing,
            JobEvent::Completed { .. } => JobStatus::Completed,
            JobEvent::Failed { .. } => JobStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("conversion {0} not found")]
    NotFound(JobId),
    #[error("conversion {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },
}

/// Pure transition function: applies an event to a job and returns the next job.
///
/// Allowed moves are `pending -> processing` and `processing -> completed | failed`.
/// Anything else, in particular any move out of a terminal state, is rejected and
/// leaves the caller's job untouched.
pub fn transition(
    mut job: ConversionJob,
    event: JobEvent,
    now: DateTime<Utc>,
) -> Result<ConversionJob, LifecycleError> {
    let to = event.target();
    let allowed = matches!(
        (job.status, to),
        (JobStatus::Pending, JobStatus::Processing)
            | (JobStatus::Processing, JobStatus::Completed)
            | (JobStatus::Processing, JobStatus::Failed)
    );
    if !allowed {
        return Err(LifecycleError::InvalidTransition {
            id: job.id,
            from: job.status,
            to,
        });
    }

    match event {
        JobEvent::Started => {}
        JobEvent::Completed { markdown, title } => {
            job.markdown = Some(markdown);
            job.title = Some(title);
            job.error_message = None;
            job.completed_at = Some(now);
        }
        JobEvent::Failed { message } => {
            job.markdown = None;
            job.error_message = Some(message);
            job.completed_at = Some(now);
        }
    }
    job.status = to;
    Ok(job)
}
