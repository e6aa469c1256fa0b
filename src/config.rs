//! Application-level configuration loading: cycle cadence, cache and alert windows, fetch limits
//! and the removal policy.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, serde_as};
use tracing::{info, warn};

use crate::{
    services::retry::RetryPolicy,
    state::{
        cache::DEFAULT_CACHE_TTL, diff::DEFAULT_ALERT_WINDOW, registry::DEFAULT_TOMBSTONE_TTL,
        registry::RemovalPolicy,
    },
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "SCORELINE_CONFIG_PATH";
/// Site the collaborator navigates; relative links in extracted pages resolve against it.
pub const DEFAULT_SOURCE_ORIGIN: &str = "https://www.flashscore.es";
/// Port used when neither `PORT` nor `SERVER_PORT` is set.
pub const DEFAULT_PORT: u16 = 19000;
/// Minimum headroom a fetch timeout keeps above the collaborator's readiness wait.
pub const FETCH_TIMEOUT_MARGIN: Duration = Duration::from_secs(4);

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Interval between periodic fetch cycles.
    #[serde(rename = "cycle_interval_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub cycle_interval: Duration,
    /// Lifetime of a static-field cache entry.
    #[serde(rename = "cache_ttl_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub cache_ttl: Duration,
    /// Length of score and phase alert windows.
    #[serde(rename = "alert_window_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub alert_window: Duration,
    /// Maximum number of concurrent extractions within one cycle.
    pub fetch_concurrency: usize,
    /// Hard timeout for a full (static + volatile) extraction. Never below
    /// `readiness_timeout` plus [`FETCH_TIMEOUT_MARGIN`].
    #[serde(rename = "full_fetch_timeout_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub full_fetch_timeout: Duration,
    /// How long the collaborator may wait for page readiness.
    #[serde(rename = "readiness_timeout_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub readiness_timeout: Duration,
    /// Hard timeout for one volatile-only attempt. Never below `readiness_timeout` plus
    /// [`FETCH_TIMEOUT_MARGIN`].
    #[serde(rename = "volatile_fetch_timeout_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub volatile_fetch_timeout: Duration,
    /// Attempts made by the volatile retry loop.
    pub volatile_retry_attempts: u32,
    /// Fixed delay between volatile attempts.
    #[serde(rename = "volatile_retry_delay_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub volatile_retry_delay: Duration,
    /// What an explicit removal does to other clients' contributions.
    pub removal_policy: RemovalPolicy,
    /// How long an explicitly removed id resists resurrection by a stale `sync`.
    #[serde(rename = "tombstone_ttl_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub tombstone_ttl: Duration,
    /// How long a request/response client may stay silent before its contributions and
    /// pending notices are dropped.
    #[serde(rename = "poll_idle_ttl_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub poll_idle_ttl: Duration,
    /// Origin used to make site-relative competition links absolute.
    pub source_origin: String,
    /// Interval between collaborator health probes.
    #[serde(rename = "source_health_interval_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub source_health_interval: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        cycle_interval_ms = config.cycle_interval.as_millis() as u64,
                        removal_policy = ?config.removal_policy,
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document; absent keys keep their defaults and zero limits are clamped.
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(contents).map(Self::sanitized)
    }

    /// Retry policy applied to volatile-only extraction.
    pub fn volatile_retry(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.volatile_retry_attempts, self.volatile_retry_delay)
    }

    fn sanitized(mut self) -> Self {
        self.fetch_concurrency = self.fetch_concurrency.max(1);
        self.volatile_retry_attempts = self.volatile_retry_attempts.max(1);
        if self.cycle_interval.is_zero() {
            self.cycle_interval = Self::default().cycle_interval;
        }
        if self.poll_idle_ttl.is_zero() {
            self.poll_idle_ttl = Self::default().poll_idle_ttl;
        }
        let floor = self.readiness_timeout + FETCH_TIMEOUT_MARGIN;
        if self.full_fetch_timeout < floor || self.volatile_fetch_timeout < floor {
            warn!(
                readiness_timeout_ms = self.readiness_timeout.as_millis() as u64,
                floor_ms = floor.as_millis() as u64,
                "fetch timeouts below readiness wait; raising them"
            );
            self.full_fetch_timeout = self.full_fetch_timeout.max(floor);
            self.volatile_fetch_timeout = self.volatile_fetch_timeout.max(floor);
        }
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cycle_interval: Duration::from_secs(10),
            cache_ttl: DEFAULT_CACHE_TTL,
            alert_window: DEFAULT_ALERT_WINDOW,
            fetch_concurrency: 4,
            full_fetch_timeout: Duration::from_secs(15),
            readiness_timeout: Duration::from_secs(8),
            volatile_fetch_timeout: Duration::from_secs(12),
            volatile_retry_attempts: 5,
            volatile_retry_delay: Duration::from_millis(500),
            removal_policy: RemovalPolicy::Global,
            tombstone_ttl: DEFAULT_TOMBSTONE_TTL,
            poll_idle_ttl: Duration::from_secs(600),
            source_origin: DEFAULT_SOURCE_ORIGIN.to_string(),
            source_health_interval: Duration::from_secs(5),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Listening port from `PORT` or `SERVER_PORT`, defaulting to [`DEFAULT_PORT`].
pub fn server_port() -> u16 {
    ["PORT", "SERVER_PORT"]
        .iter()
        .filter_map(|key| env::var(key).ok())
        .find_map(|value| value.trim().parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT)
}
