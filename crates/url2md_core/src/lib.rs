//! url2md core: conversion lifecycle, shared stores and admission control.
mod activity;
mod event;
mod job;
mod lifecycle;
mod rate_limit;
mod stats;
mod store;
mod sync;

pub use activity::{ActivityLog, ActivityLogEntry, LogBreakdown, LogType, MAX_LOG_PAGE};
pub use event::NotificationEvent;
pub use job::{ConversionJob, JobId, JobStatus, JobSummary};
pub use lifecycle::{transition, JobEvent, LifecycleError};
pub use rate_limit::{RateLimitConfig, RateLimitEntry, RateLimitExceeded, RateLimitInfo, RateLimiter};
pub use stats::{ServerStats, StatsTracker};
pub use store::{LifecycleStore, RetentionPolicy, MAX_LIST_LIMIT};
