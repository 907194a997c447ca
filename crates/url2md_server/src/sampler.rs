//! Background maintenance: stats sampling and rate-limit sweeping.
//!
//! Both loops run until the shared cancellation token fires.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url2md_core::NotificationEvent;
use url2md_logging::{conv_debug, conv_info};

use crate::context::AppContext;

/// Process CPU and memory readings. Zero where the platform offers nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessSample {
    /// Accumulated user+system CPU time.
    pub cpu_time: Duration,
    /// Resident set size in bytes.
    pub resident_bytes: u64,
}

// Linux defaults; sysconf is not available without libc.
const CLOCK_TICKS_PER_SEC: u64 = 100;
const PAGE_SIZE: u64 = 4096;

impl ProcessSample {
    pub fn read() -> Self {
        std::fs::read_to_string("/proc/self/stat")
            .ok()
            .and_then(|stat| Self::parse_proc_stat(&stat))
            .unwrap_or_default()
    }

    /// Parses the contents of `/proc/<pid>/stat`.
    pub fn parse_proc_stat(stat: &str) -> Option<Self> {
        // The command name may contain spaces; fields restart after its ')'.
        let rest = &stat[stat.rfind(')')? + 1..];
        let fields: Vec<&str> = rest.split_whitespace().collect();
        // rest starts at field 3 (state); utime=14, stime=15, rss=24.
        let utime: u64 = fields.get(11)?.parse().ok()?;
        let stime: u64 = fields.get(12)?.parse().ok()?;
        let rss_pages: u64 = fields.get(21)?.parse().ok()?;
        let ticks = utime + stime;
        Some(Self {
            cpu_time: Duration::from_millis(ticks * 1000 / CLOCK_TICKS_PER_SEC),
            resident_bytes: rss_pages * PAGE_SIZE,
        })
    }
}

/// CPU usage percentage between two samples taken `wall` apart.
pub fn cpu_percent(previous: ProcessSample, current: ProcessSample, wall: Duration) -> u32 {
    if wall.is_zero() {
        return 0;
    }
    let used = current.cpu_time.saturating_sub(previous.cpu_time);
    let percent = used.as_secs_f64() / wall.as_secs_f64() * 100.0;
    percent.round().clamp(0.0, u32::MAX as f64) as u32
}

/// Refreshes the sampled fields of the stats tracker and tells observers.
pub fn refresh_stats(ctx: &AppContext, cpu_usage: u32, sample: ProcessSample) {
    let connections = u32::try_from(ctx.events.subscriber_count()).unwrap_or(u32::MAX);
    ctx.stats.set_active_connections(connections);
    ctx.stats
        .record_sample(cpu_usage, sample.resident_bytes / (1024 * 1024));
    ctx.events.publish(NotificationEvent::StatsUpdate {});
}

pub fn spawn_stats_sampler(
    ctx: Arc<AppContext>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut previous = ProcessSample::read();
        let mut previous_at = Instant::now();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    conv_info!("Stats sampler stopping");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    let current = ProcessSample::read();
                    let now = Instant::now();
                    let cpu = cpu_percent(previous, current, now - previous_at);
                    refresh_stats(&ctx, cpu, current);
                    previous = current;
                    previous_at = now;
                }
            }
        }
    })
}

pub fn spawn_rate_limit_sweeper(ctx: Arc<AppContext>, cancel: CancellationToken) -> JoinHandle<()> {
    let interval = ctx.limiter.config().sweep_interval.max(Duration::from_secs(1));
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    conv_info!("Rate limit sweeper stopping");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    let removed = ctx.limiter.sweep();
                    if removed > 0 {
                        conv_debug!("Swept {} expired rate limit entries", removed);
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_proc_stat_with_spaces_in_name() {
        let stat = "1234 (my server) S 1 1234 1234 0 -1 4194560 500 0 0 0 250 50 0 0 20 0 4 0 100 123456789 2560 18446744073709551615";
        let sample = ProcessSample::parse_proc_stat(stat).unwrap();
        assert_eq!(sample.cpu_time, Duration::from_secs(3));
        assert_eq!(sample.resident_bytes, 2560 * 4096);
    }

    #[test]
    fn cpu_percent_is_share_of_wall_time() {
        let before = ProcessSample::default();
        let after = ProcessSample {
            cpu_time: Duration::from_millis(500),
            resident_bytes: 0,
        };
        assert_eq!(cpu_percent(before, after, Duration::from_secs(1)), 50);
        assert_eq!(cpu_percent(before, after, Duration::ZERO), 0);
    }
}
