use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use url2md_core::{RateLimitConfig, RetentionPolicy};
use url2md_engine::FetchSettings;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
    #[error("{field} = {value} is out of range")]
    OutOfRange { field: &'static str, value: u64 },
}

/// Everything tunable about a running server. Every field has a default, so a
/// config file only names what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub fetch: FetchConfig,
    pub rate_limit: RateLimitSettings,
    pub retention: RetentionSettings,
    /// How often CPU/memory are sampled and `stats_update` is emitted.
    pub stats_interval_secs: u64,
    /// Job history is loaded from and saved to this file when set.
    pub history_file: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub verbose: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            fetch: FetchConfig::default(),
            rate_limit: RateLimitSettings::default(),
            retention: RetentionSettings::default(),
            stats_interval_secs: 30,
            history_file: None,
            log_file: None,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub redirect_limit: usize,
    pub max_bytes: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        let defaults = FetchSettings::default();
        Self {
            request_timeout_secs: defaults.request_timeout.as_secs(),
            connect_timeout_secs: defaults.connect_timeout.as_secs(),
            redirect_limit: defaults.redirect_limit,
            max_bytes: defaults.max_bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub max_requests: u32,
    pub window_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        let defaults = RateLimitConfig::default();
        Self {
            max_requests: defaults.max_requests,
            window_secs: defaults.window.as_secs(),
            sweep_interval_secs: defaults.sweep_interval.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionSettings {
    pub max_jobs: Option<usize>,
    pub max_job_age_secs: Option<u64>,
    pub max_log_entries: Option<usize>,
}

impl ServerConfig {
    /// Loads a RON config file. A missing file is an error; use `Default` for no file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_ron(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that parse but cannot be represented at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(secs) = self.retention.max_job_age_secs {
            if job_age(secs).is_none() {
                return Err(ConfigError::OutOfRange {
                    field: "retention.max_job_age_secs",
                    value: secs,
                });
            }
        }
        Ok(())
    }

    pub fn from_ron(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            connect_timeout: Duration::from_secs(self.fetch.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.fetch.request_timeout_secs),
            redirect_limit: self.fetch.redirect_limit,
            max_bytes: self.fetch.max_bytes,
            ..FetchSettings::default()
        }
    }

    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_requests: self.rate_limit.max_requests,
            window: Duration::from_secs(self.rate_limit.window_secs),
            sweep_interval: Duration::from_secs(self.rate_limit.sweep_interval_secs),
        }
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_jobs: self.retention.max_jobs,
            max_age: self.retention.max_job_age_secs.and_then(job_age),
        }
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs.max(1))
    }
}

fn job_age(secs: u64) -> Option<TimeDelta> {
    i64::try_from(secs).ok().and_then(TimeDelta::try_seconds)
}
