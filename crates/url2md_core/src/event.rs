use serde::{Deserialize, Serialize};

use crate::JobId;

/// Payloads pushed to observers. Serializes as `{"type": ..., "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum NotificationEvent {
    ConversionStarted {
        id: JobId,
        url: String,
    },
    ConversionCompleted {
        id: JobId,
        url: String,
        title: String,
    },
    ConversionFailed {
        id: JobId,
        url: String,
        error: String,
    },
    StatsUpdate {},
    StatusUpdate {},
}

impl NotificationEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::ConversionStarted { .. } => "conversion_started",
            NotificationEvent::ConversionCompleted { .. } => "conversion_completed",
            NotificationEvent::ConversionFailed { .. } => "conversion_failed",
            NotificationEvent::StatsUpdate {} => "stats_update",
            NotificationEvent::StatusUpdate {} => "status_update",
        }
    }
}
