use std::collections::VecDeque;
use std::fmt;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url2md_logging::{conv_error, conv_info, conv_warn};
use uuid::Uuid;

use crate::sync;

/// Upper bound for activity log listings.
pub const MAX_LOG_PAGE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogType::Info => "INFO",
            LogType::Success => "SUCCESS",
            LogType::Warning => "WARNING",
            LogType::Error => "ERROR",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogEntry {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub log_type: LogType,
    pub message: String,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// Counts of recent entries per type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LogBreakdown {
    pub total: usize,
    pub info: usize,
    pub success: usize,
    pub warning: usize,
    pub error: usize,
}

/// Append-only activity record, newest entries at the back.
///
/// Every entry is mirrored to the `log` facade so the process log and the
/// queryable history never disagree.
#[derive(Debug, Default)]
pub struct ActivityLog {
    entries: RwLock<VecDeque<ActivityLogEntry>>,
    max_entries: Option<usize>,
}

impl ActivityLog {
    pub fn new(max_entries: Option<usize>) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            max_entries,
        }
    }

    pub fn record(
        &self,
        log_type: LogType,
        message: impl Into<String>,
        metadata: Option<Value>,
    ) -> ActivityLogEntry {
        let entry = ActivityLogEntry {
            id: Uuid::new_v4(),
            log_type,
            message: message.into(),
            metadata,
            created_at: Utc::now(),
        };
        mirror(&entry);

        let mut entries = sync::write(&self.entries);
        entries.push_back(entry.clone());
        if let Some(max) = self.max_entries {
            while entries.len() > max {
                entries.pop_front();
            }
        }
        entry
    }

    pub fn info(&self, message: impl Into<String>, metadata: Option<Value>) -> ActivityLogEntry {
        self.record(LogType::Info, message, metadata)
    }

    pub fn success(&self, message: impl Into<String>, metadata: Option<Value>) -> ActivityLogEntry {
        self.record(LogType::Success, message, metadata)
    }

    pub fn warning(&self, message: impl Into<String>, metadata: Option<Value>) -> ActivityLogEntry {
        self.record(LogType::Warning, message, metadata)
    }

    pub fn error(&self, message: impl Into<String>, metadata: Option<Value>) -> ActivityLogEntry {
        self.record(LogType::Error, message, metadata)
    }

    /// Newest first, at most `min(limit, MAX_LOG_PAGE)` entries.
    pub fn recent(&self, limit: usize) -> Vec<ActivityLogEntry> {
        sync::read(&self.entries)
            .iter()
            .rev()
            .take(limit.min(MAX_LOG_PAGE))
            .cloned()
            .collect()
    }

    pub fn breakdown(&self, limit: usize) -> LogBreakdown {
        self.recent(limit)
            .iter()
            .fold(LogBreakdown::default(), |mut acc, entry| {
                acc.total += 1;
                match entry.log_type {
                    LogType::Info => acc.info += 1,
                    LogType::Success => acc.success += 1,
                    LogType::Warning => acc.warning += 1,
                    LogType::Error => acc.error += 1,
                }
                acc
            })
    }

    pub fn len(&self) -> usize {
        sync::read(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn mirror(entry: &ActivityLogEntry) {
    let metadata = entry
        .metadata
        .as_ref()
        .map(Value::to_string)
        .unwrap_or_default();
    match entry.log_type {
        LogType::Info | LogType::Success => {
            conv_info!("[{}] {} {}", entry.log_type, entry.message, metadata)
        }
        LogType::Warning => conv_warn!("[{}] {} {}", entry.log_type, entry.message, metadata),
        LogType::Error => conv_error!("[{}] {} {}", entry.log_type, entry.message, metadata),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn recent_is_newest_first_and_clamped() {
        let log = ActivityLog::default();
        for i in 0..120 {
            log.info(format!("entry {i}"), None);
        }
        let recent = log.recent(500);
        assert_eq!(recent.len(), MAX_LOG_PAGE);
        assert_eq!(recent[0].message, "entry 119");
    }

    #[test]
    fn max_entries_drops_oldest() {
        let log = ActivityLog::new(Some(2));
        log.info("a", None);
        log.warning("b", None);
        log.error("c", Some(json!({ "code": 1 })));
        let messages: Vec<_> = log.recent(10).into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["c", "b"]);
    }

    #[test]
    fn breakdown_counts_each_type() {
        let log = ActivityLog::default();
        log.info("i", None);
        log.success("s", None);
        log.success("s2", None);
        log.error("e", None);
        let counts = log.breakdown(50);
        assert_eq!(counts.total, 4);
        assert_eq!(counts.success, 2);
        assert_eq!(counts.error, 1);
        assert_eq!(counts.warning, 0);
    }
}
