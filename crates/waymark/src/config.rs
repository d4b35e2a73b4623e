//! Server configuration.
//!
//! Defaults are usable as-is; [`ServerConfig::from_env`] overlays
//! `WAYMARK_*` environment variables on top of them.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use waymark_hub::HubConfig;
use waymark_store::CacheConfig;
use waymark_throttle::ThrottleConfig;

/// Address to listen on.
pub const ENV_BIND: &str = "WAYMARK_BIND";
/// Position cache TTL, whole seconds.
pub const ENV_CACHE_TTL_SECS: &str = "WAYMARK_CACHE_TTL_SECS";
/// Throttle distance threshold, meters.
pub const ENV_MIN_DISTANCE_M: &str = "WAYMARK_MIN_DISTANCE_M";
/// Throttle interval threshold, whole seconds.
pub const ENV_MIN_INTERVAL_SECS: &str = "WAYMARK_MIN_INTERVAL_SECS";
/// Admission timeout, whole seconds.
pub const ENV_ADMISSION_TIMEOUT_SECS: &str = "WAYMARK_ADMISSION_TIMEOUT_SECS";

/// A configuration value that could not be used.
#[derive(Debug, thiserror::Error)]
#[error("invalid {var}={value:?}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

/// Full configuration for a Waymark server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// How long admission (token check plus directory lookups) may take
    /// before the connection is closed as `unavailable`.
    pub admission_timeout: Duration,

    /// How often expired cache entries are reclaimed. Zero disables the
    /// sweep; reads never depend on it.
    pub cache_sweep_interval: Duration,

    /// Upper bound on the `limit` of a history query.
    pub max_history_limit: usize,

    pub throttle: ThrottleConfig,
    pub cache: CacheConfig,
    pub hub: HubConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            admission_timeout: Duration::from_secs(10),
            cache_sweep_interval: Duration::from_secs(60),
            max_history_limit: 1000,
            throttle: ThrottleConfig::default(),
            cache: CacheConfig::default(),
            hub: HubConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults overlaid with any `WAYMARK_*` variables set in the
    /// process environment.
    ///
    /// # Errors
    /// [`ConfigError`] naming the first variable that does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|var| std::env::var(var).ok())
    }

    /// Applies overrides read through `lookup`, which maps a variable
    /// name to its value if set.
    ///
    /// # Errors
    /// [`ConfigError`] naming the first variable that does not parse.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(addr) = lookup(ENV_BIND) {
            if addr.trim().is_empty() {
                return Err(ConfigError {
                    var: ENV_BIND,
                    value: addr,
                    reason: "must not be empty".into(),
                });
            }
            self.bind_addr = addr;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, ENV_CACHE_TTL_SECS)? {
            self.cache.ttl = Duration::from_secs(secs);
        }
        if let Some(meters) = parse_var::<f64>(&lookup, ENV_MIN_DISTANCE_M)? {
            if !meters.is_finite() || meters < 0.0 {
                return Err(ConfigError {
                    var: ENV_MIN_DISTANCE_M,
                    value: meters.to_string(),
                    reason: "must be a non-negative number".into(),
                });
            }
            self.throttle.min_distance_m = meters;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, ENV_MIN_INTERVAL_SECS)? {
            self.throttle.min_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, ENV_ADMISSION_TIMEOUT_SECS)? {
            if secs == 0 {
                return Err(ConfigError {
                    var: ENV_ADMISSION_TIMEOUT_SECS,
                    value: secs.to_string(),
                    reason: "must be at least 1".into(),
                });
            }
            self.admission_timeout = Duration::from_secs(secs);
        }
        Ok(self)
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    lookup(var)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError {
                var,
                value: raw.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}
