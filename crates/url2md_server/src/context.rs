use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use url2md_core::{ActivityLog, LifecycleStore, RateLimiter, StatsTracker};
use url2md_engine::{Fetcher, PageConverter, ReqwestFetcher};

use crate::config::ServerConfig;
use crate::events::EventBus;

/// How the server is reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// HTTP routes, including the `/mcp` JSON-RPC endpoint.
    Http,
    /// JSON-RPC frames over stdin/stdout; HTTP is not started.
    Stdio,
}

/// Shared state handed to every request handler and protocol call.
///
/// Built once at startup; tests build their own isolated instance.
pub struct AppContext {
    pub store: LifecycleStore,
    pub activity: ActivityLog,
    pub stats: StatsTracker,
    pub limiter: RateLimiter,
    pub events: EventBus,
    pub converter: PageConverter,
    pub transport: Transport,
    pub started_at: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    pub protocol_status: &'static str,
    pub http_status: &'static str,
    pub rate_limiting_status: &'static str,
    pub events_status: &'static str,
}

impl AppContext {
    pub fn from_config(config: &ServerConfig, transport: Transport) -> Self {
        let fetcher = ReqwestFetcher::new(config.fetch_settings());
        Self::with_fetcher(config, transport, Arc::new(fetcher))
    }

    pub fn with_fetcher(
        config: &ServerConfig,
        transport: Transport,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            store: LifecycleStore::new(config.retention_policy()),
            activity: ActivityLog::new(config.retention.max_log_entries),
            stats: StatsTracker::new(),
            limiter: RateLimiter::new(config.rate_limit_config()),
            events: EventBus::default(),
            converter: PageConverter::new(fetcher),
            transport,
            started_at: Instant::now(),
        }
    }

    pub fn status(&self) -> ServerStatus {
        let events_status = if self.events.subscriber_count() > 0 {
            "connected"
        } else {
            "idle"
        };
        ServerStatus {
            protocol_status: "active",
            http_status: match self.transport {
                Transport::Http => "available",
                Transport::Stdio => "disabled",
            },
            rate_limiting_status: "active",
            events_status,
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
