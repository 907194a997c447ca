use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sync;

/// Aggregate server counters as exposed by `stats://server` and `/api/stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStats {
    /// Successful conversions since start.
    pub total_conversions: u64,
    pub active_connections: u32,
    /// Mean wall-clock time per conversion attempt, in milliseconds.
    pub average_response_time: u64,
    /// Percentage of attempts that completed, 0-100.
    pub success_rate: u32,
    /// Process CPU usage in percent at the last sample.
    pub cpu_usage: u32,
    /// Resident memory in MiB at the last sample.
    pub memory_usage: u64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Counters {
    succeeded: u64,
    failed: u64,
    total_response_ms: u128,
    stats: ServerStats,
}

/// Singleton owner of [`ServerStats`]; fed by conversion flows and the sampler.
#[derive(Debug)]
pub struct StatsTracker {
    inner: Mutex<Counters>,
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsTracker {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Counters {
                succeeded: 0,
                failed: 0,
                total_response_ms: 0,
                stats: ServerStats {
                    total_conversions: 0,
                    active_connections: 0,
                    average_response_time: 0,
                    success_rate: 0,
                    cpu_usage: 0,
                    memory_usage: 0,
                    updated_at: Utc::now(),
                },
            }),
        }
    }

    pub fn record_conversion(&self, succeeded: bool, elapsed: Duration) {
        let mut inner = sync::lock(&self.inner);
        if succeeded {
            inner.succeeded += 1;
        } else {
            inner.failed += 1;
        }
        inner.total_response_ms += elapsed.as_millis();

        let attempts = inner.succeeded + inner.failed;
        let average = inner.total_response_ms / u128::from(attempts);
        let rate = inner.succeeded * 100 / attempts;
        inner.stats.total_conversions = inner.succeeded;
        inner.stats.average_response_time = u64::try_from(average).unwrap_or(u64::MAX);
        inner.stats.success_rate = u32::try_from(rate).unwrap_or(100);
        inner.stats.updated_at = Utc::now();
    }

    pub fn set_active_connections(&self, connections: u32) {
        let mut inner = sync::lock(&self.inner);
        inner.stats.active_connections = connections;
        inner.stats.updated_at = Utc::now();
    }

    pub fn record_sample(&self, cpu_usage: u32, memory_usage: u64) {
        let mut inner = sync::lock(&self.inner);
        inner.stats.cpu_usage = cpu_usage;
        inner.stats.memory_usage = memory_usage;
        inner.stats.updated_at = Utc::now();
    }

    pub fn snapshot(&self) -> ServerStats {
        sync::lock(&self.inner).stats.clone()
    }
}
