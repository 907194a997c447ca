use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use url2md_logging::{conv_debug, conv_info};

use crate::lifecycle::{transition, JobEvent, LifecycleError};
use crate::sync;
use crate::{ConversionJob, JobId, JobStatus};

/// Upper bound for any caller-supplied listing limit.
pub const MAX_LIST_LIMIT: usize = 50;

const INTERRUPTED_MESSAGE: &str = "Conversion interrupted before completion";

/// How much finished history the store keeps. Unbounded by default.
///
/// Only terminal jobs are ever evicted; a job that is still pending or
/// processing stays put until its flow finishes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub max_jobs: Option<usize>,
    pub max_age: Option<Duration>,
}

impl RetentionPolicy {
    pub fn unbounded() -> Self {
        Self::default()
    }
}

#[derive(Debug)]
struct Slot {
    // Insertion order, breaks ties between jobs created in the same instant.
    seq: u64,
    job: ConversionJob,
}

#[derive(Debug, Default)]
struct Jobs {
    slots: HashMap<JobId, Slot>,
    next_seq: u64,
}

impl Jobs {
    fn insert(&mut self, job: ConversionJob) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.slots.insert(job.id, Slot { seq, job });
    }
}

/// Owns every [`ConversionJob`] and is the only place they are mutated.
///
/// Each job is written by exactly one conversion flow, so the single lock only
/// serializes map access; it never orders writes to the same job.
#[derive(Debug, Default)]
pub struct LifecycleStore {
    jobs: RwLock<Jobs>,
    retention: RetentionPolicy,
}

impl LifecycleStore {
    pub fn new(retention: RetentionPolicy) -> Self {
        Self {
            jobs: RwLock::new(Jobs::default()),
            retention,
        }
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    /// Registers a new job in `pending`.
    pub fn create(&self, url: &str, include_images: bool, clean_html: bool) -> ConversionJob {
        self.create_at(url, include_images, clean_html, Utc::now())
    }

    pub fn create_at(
        &self,
        url: &str,
        include_images: bool,
        clean_html: bool,
        now: DateTime<Utc>,
    ) -> ConversionJob {
        let job = ConversionJob::new(url, include_images, clean_html, now);
        let mut jobs = sync::write(&self.jobs);
        jobs.insert(job.clone());
        let evicted = evict(&mut jobs, self.retention, now);
        if evicted > 0 {
            conv_debug!("Evicted {} finished conversions under retention policy", evicted);
        }
        job
    }

    pub fn start_processing(&self, id: JobId) -> Result<ConversionJob, LifecycleError> {
        self.apply(id, JobEvent::Started)
    }

    pub fn complete(
        &self,
        id: JobId,
        markdown: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<ConversionJob, LifecycleError> {
        self.apply(
            id,
            JobEvent::Completed {
                markdown: markdown.into(),
                title: title.into(),
            },
        )
    }

    pub fn fail(
        &self,
        id: JobId,
        message: impl Into<String>,
    ) -> Result<ConversionJob, LifecycleError> {
        self.apply(
            id,
            JobEvent::Failed {
                message: message.into(),
            },
        )
    }

    /// Applies `event` to the job with `id`. A rejected transition leaves the stored job unchanged.
    pub fn apply(&self, id: JobId, event: JobEvent) -> Result<ConversionJob, LifecycleError> {
        let mut jobs = sync::write(&self.jobs);
        let slot = jobs
            .slots
            .get_mut(&id)
            .ok_or(LifecycleError::NotFound(id))?;
        let next = transition(slot.job.clone(), event, Utc::now())?;
        slot.job = next.clone();
        Ok(next)
    }

    pub fn get(&self, id: JobId) -> Option<ConversionJob> {
        sync::read(&self.jobs).slots.get(&id).map(|slot| slot.job.clone())
    }

    /// Newest-first by creation time, at most `min(limit, MAX_LIST_LIMIT)` jobs.
    pub fn list_recent(&self, limit: usize) -> Vec<ConversionJob> {
        self.newest_first(limit.min(MAX_LIST_LIMIT), |_| true)
    }

    /// Newest-first jobs created at or after `cutoff`, at most `limit` of them.
    pub fn created_since(&self, cutoff: DateTime<Utc>, limit: usize) -> Vec<ConversionJob> {
        self.newest_first(limit, |job| job.created_at >= cutoff)
    }

    pub fn len(&self) -> usize {
        sync::read(&self.jobs).slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All jobs, oldest first. Used for persisting history.
    pub fn snapshot(&self) -> Vec<ConversionJob> {
        let jobs = sync::read(&self.jobs);
        let mut slots: Vec<&Slot> = jobs.slots.values().collect();
        slots.sort_by(|a, b| {
            a.job
                .created_at
                .cmp(&b.job.created_at)
                .then(a.seq.cmp(&b.seq))
        });
        slots.into_iter().map(|slot| slot.job.clone()).collect()
    }

    /// Loads previously persisted jobs. Ids already present are skipped.
    ///
    /// A job persisted while still pending or processing can never be finished by
    /// its (gone) flow, so it comes back as failed.
    pub fn restore(&self, history: Vec<ConversionJob>) -> usize {
        let now = Utc::now();
        let mut jobs = sync::write(&self.jobs);
        let mut restored = 0;
        for mut job in history {
            if jobs.slots.contains_key(&job.id) {
                continue;
            }
            if !job.status.is_terminal() {
                job.status = JobStatus::Failed;
                job.markdown = None;
                job.error_message = Some(INTERRUPTED_MESSAGE.to_string());
                job.completed_at = Some(now);
            }
            jobs.insert(job);
            restored += 1;
        }
        evict(&mut jobs, self.retention, now);
        conv_info!("Restored {} conversions from history", restored);
        restored
    }

    fn newest_first<F>(&self, limit: usize, keep: F) -> Vec<ConversionJob>
    where
        F: Fn(&ConversionJob) -> bool,
    {
        let jobs = sync::read(&self.jobs);
        let mut slots: Vec<&Slot> = jobs.slots.values().filter(|slot| keep(&slot.job)).collect();
        slots.sort_by(|a, b| {
            b.job
                .created_at
                .cmp(&a.job.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        slots
            .into_iter()
            .take(limit)
            .map(|slot| slot.job.clone())
            .collect()
    }
}

fn evict(jobs: &mut Jobs, policy: RetentionPolicy, now: DateTime<Utc>) -> usize {
    let before = jobs.slots.len();

    // A cutoff before the earliest representable time keeps every job.
    if let Some(cutoff) = policy.max_age.and_then(|age| now.checked_sub_signed(age)) {
        jobs.slots
            .retain(|_, slot| !(slot.job.status.is_terminal() && slot.job.created_at < cutoff));
    }

    if let Some(max_jobs) = policy.max_jobs {
        if jobs.slots.len() > max_jobs {
            let mut finished: Vec<(DateTime<Utc>, u64, JobId)> = jobs
                .slots
                .values()
                .filter(|slot| slot.job.status.is_terminal())
                .map(|slot| (slot.job.created_at, slot.seq, slot.job.id))
                .collect();
            finished.sort();
            let excess = jobs.slots.len() - max_jobs;
            for (_, _, id) in finished.into_iter().take(excess) {
                jobs.slots.remove(&id);
            }
        }
    }

    before - jobs.slots.len()
}
