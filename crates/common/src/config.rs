use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ShortlinkError, ShortlinkResult};

/// Path segments that can never be used as short codes.
pub const RESERVED_PATHS: &[&str] = &["api", "static", "health", "metrics", "index.html", "favicon.ico"];

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub geoip: GeoIpConfig,
    #[serde(default)]
    pub recorder: RecorderConfig,
    #[serde(default)]
    pub links: Vec<LinkConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Whether `X-Forwarded-For` / `X-Real-IP` are honoured when deriving the
    /// client identity. Only safe behind a proxy that overwrites them.
    #[serde(default = "default_true")]
    pub trust_proxy_headers: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            trust_proxy_headers: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_rps")]
    pub rps: u64,
    #[serde(default = "default_burst")]
    pub burst: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rps: default_rps(),
            burst: default_burst(),
            sweep_interval_secs: default_sweep_interval(),
            stale_after_secs: default_stale_after(),
        }
    }
}

impl RateLimitConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoIpConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_geoip_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_lookup_timeout")]
    pub timeout_ms: u64,
    /// When set, lookups go to this MaxMind database instead of `endpoint`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

impl Default for GeoIpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_geoip_endpoint(),
            timeout_ms: default_lookup_timeout(),
            database_path: None,
        }
    }
}

impl GeoIpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_click_log_path")]
    pub log_path: PathBuf,
    #[serde(default = "default_write_timeout")]
    pub write_timeout_ms: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_path: default_click_log_path(),
            write_timeout_ms: default_write_timeout(),
        }
    }
}

impl RecorderConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// A short code and the target it redirects to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    pub id: u64,
    pub code: String,
    pub target: String,
}

// Default value helpers
fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_true() -> bool {
    true
}
fn default_rps() -> u64 {
    10
}
fn default_burst() -> u64 {
    20
}
fn default_sweep_interval() -> u64 {
    5 * 60
}
fn default_stale_after() -> u64 {
    10 * 60
}
fn default_geoip_endpoint() -> String {
    "http://ip-api.com/json".to_string()
}
fn default_lookup_timeout() -> u64 {
    2_000
}
fn default_click_log_path() -> PathBuf {
    PathBuf::from("clicks.jsonl")
}
fn default_write_timeout() -> u64 {
    1_000
}

impl AppConfig {
    /// Load configuration from a YAML file, apply environment overrides and
    /// validate the result.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yaml::from_str(&content)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Override selected settings from the environment.
    ///
    /// Recognised keys are `PORT`, `RATE_LIMIT_RPS` and `RATE_LIMIT_BURST`.
    /// Values that fail to parse are ignored with a warning. The lookup is
    /// injected so callers (and tests) decide where values come from.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT").filter(|p| !p.is_empty()) {
            match port.parse::<u16>() {
                Ok(port) => {
                    let host = self
                        .server
                        .listen
                        .rsplit_once(':')
                        .map(|(host, _)| host.to_string())
                        .unwrap_or_else(|| "0.0.0.0".to_string());
                    self.server.listen = format!("{}:{}", host, port);
                }
                Err(e) => tracing::warn!(value = %port, error = %e, "ignoring invalid PORT"),
            }
        }

        if let Some(value) = parse_env_u64(&lookup, "RATE_LIMIT_RPS") {
            self.rate_limit.rps = value;
        }
        if let Some(value) = parse_env_u64(&lookup, "RATE_LIMIT_BURST") {
            self.rate_limit.burst = value;
        }
    }

    /// Validate the configuration for consistency.
    pub fn validate(&self) -> ShortlinkResult<()> {
        let rl = &self.rate_limit;
        if rl.rps == 0 {
            return Err(config_error("rate_limit.rps must be at least 1"));
        }
        if rl.burst == 0 {
            return Err(config_error("rate_limit.burst must be at least 1"));
        }
        if rl.sweep_interval_secs == 0 || rl.stale_after_secs == 0 {
            return Err(config_error(
                "rate_limit.sweep_interval_secs and rate_limit.stale_after_secs must be non-zero",
            ));
        }
        if self.geoip.timeout_ms == 0 {
            return Err(config_error("geoip.timeout_ms must be non-zero"));
        }
        if self.recorder.write_timeout_ms == 0 {
            return Err(config_error("recorder.write_timeout_ms must be non-zero"));
        }

        let mut seen = HashSet::new();
        for link in &self.links {
            if link.code.is_empty() || link.code.contains('/') {
                return Err(config_error(format!("link {} has an invalid code '{}'", link.id, link.code)));
            }
            if RESERVED_PATHS.contains(&link.code.as_str()) {
                return Err(config_error(format!("link code '{}' is a reserved path", link.code)));
            }
            if link.target.is_empty() {
                return Err(config_error(format!("link '{}' has an empty target", link.code)));
            }
            if !seen.insert(link.code.as_str()) {
                return Err(config_error(format!("duplicate link code '{}'", link.code)));
            }
        }

        Ok(())
    }
}

fn parse_env_u64<F>(lookup: &F, key: &str) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).filter(|v| !v.is_empty())?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, value = %raw, error = %e, "ignoring invalid environment override");
            None
        }
    }
}

fn config_error(message: impl Into<String>) -> ShortlinkError {
    ShortlinkError::Config(message.into())
}
