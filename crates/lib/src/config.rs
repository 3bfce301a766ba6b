//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.wecom-logger/config.json`) and environment.
//! Keys follow the plugin's config mapping (`redis_key`, `redis_stream_prefix`).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LIST_KEY: &str = "langbot:wecom:llm_replies";
pub const DEFAULT_STREAM_PREFIX: &str = "langbot:wecom:stream";
pub const DEFAULT_STREAM_MAX_LEN: usize = 1000;
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:16379/0";
pub const DEFAULT_MAX_PENDING_CYCLES: usize = 10_000;

/// Top-level plugin config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// List receiving every record (default `langbot:wecom:llm_replies`).
    #[serde(default)]
    pub redis_key: Option<String>,

    /// Prefix of the per-agent stream key; the stream is `<prefix>:<internal_agent_id>`.
    #[serde(default)]
    pub redis_stream_prefix: Option<String>,

    /// Approximate cap on each per-agent stream (default 1000).
    #[serde(default = "default_stream_max_len")]
    pub stream_max_len: usize,

    /// Conversations that may await a reply at once; the oldest is dropped beyond this.
    #[serde(default = "default_max_pending_cycles")]
    pub max_pending_cycles: usize,

    /// Redis connection settings.
    #[serde(default)]
    pub redis: RedisConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_key: None,
            redis_stream_prefix: None,
            stream_max_len: default_stream_max_len(),
            max_pending_cycles: default_max_pending_cycles(),
            redis: RedisConfig::default(),
        }
    }
}

/// Redis connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Connection URL. Overridden by REDIS_URL env.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub response_timeout_secs: u64,

    /// Reconnect attempts before a write is reported as failed.
    #[serde(default = "default_connect_retries")]
    pub connect_retries: usize,
}

fn default_stream_max_len() -> usize {
    DEFAULT_STREAM_MAX_LEN
}

fn default_max_pending_cycles() -> usize {
    DEFAULT_MAX_PENDING_CYCLES
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_connect_retries() -> usize {
    2
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            connect_timeout_secs: default_timeout_secs(),
            response_timeout_secs: default_timeout_secs(),
            connect_retries: default_connect_retries(),
        }
    }
}

impl RedisConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// List key: configured value, or the default when unset or blank.
pub fn resolve_list_key(config: &Config) -> String {
    non_empty(config.redis_key.as_deref()).unwrap_or_else(|| DEFAULT_LIST_KEY.to_string())
}

/// Stream prefix: configured value, or the default when unset or blank.
pub fn resolve_stream_prefix(config: &Config) -> String {
    non_empty(config.redis_stream_prefix.as_deref())
        .unwrap_or_else(|| DEFAULT_STREAM_PREFIX.to_string())
}

/// Per-agent stream key: `<prefix>:<internal_agent_id>`.
pub fn stream_key(config: &Config, internal_agent_id: &str) -> String {
    format!("{}:{}", resolve_stream_prefix(config), internal_agent_id)
}

/// Resolve the Redis URL: env REDIS_URL overrides config; falls back to the default.
pub fn resolve_redis_url(config: &Config) -> String {
    pick_redis_url(std::env::var("REDIS_URL").ok().as_deref(), config)
}

fn pick_redis_url(env: Option<&str>, config: &Config) -> String {
    non_empty(env)
        .or_else(|| non_empty(config.redis.url.as_deref()))
        .unwrap_or_else(|| DEFAULT_REDIS_URL.to_string())
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("WECOM_LOGGER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".wecom-logger").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path, the default path, or WECOM_LOGGER_CONFIG. Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(resolve_list_key(&config), "langbot:wecom:llm_replies");
        assert_eq!(resolve_stream_prefix(&config), "langbot:wecom:stream");
        assert_eq!(config.stream_max_len, 1000);
        assert_eq!(config.max_pending_cycles, 10_000);
        assert_eq!(config.redis.connect_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn blank_keys_fall_back_to_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "redis_key": "  ", "redis_stream_prefix": "" }"#).unwrap();
        assert_eq!(resolve_list_key(&config), DEFAULT_LIST_KEY);
        assert_eq!(resolve_stream_prefix(&config), DEFAULT_STREAM_PREFIX);
    }

    #[test]
    fn stream_key_is_partitioned_by_agent() {
        let mut config = Config::default();
        config.redis_stream_prefix = Some("logs:stream".to_string());
        assert_eq!(stream_key(&config, "A1"), "logs:stream:A1");
        assert_ne!(stream_key(&config, "A1"), stream_key(&config, "A2"));
    }

    #[test]
    fn parses_full_config() {
        let raw = r#"{
            "redis_key": "replies",
            "redis_stream_prefix": "agents",
            "stream_max_len": 50,
            "redis": { "url": "redis://cache:6379/2", "connect_timeout_secs": 1 }
        }"#;
        let config: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(resolve_list_key(&config), "replies");
        assert_eq!(config.stream_max_len, 50);
        assert_eq!(config.redis.connect_timeout_secs, 1);
        assert_eq!(config.redis.response_timeout_secs, 5);
        assert_eq!(config.redis.connect_retries, 2);
    }

    #[test]
    fn redis_url_precedence() {
        let mut config = Config::default();
        assert_eq!(pick_redis_url(None, &config), DEFAULT_REDIS_URL);
        config.redis.url = Some("redis://cfg:6379/0".to_string());
        assert_eq!(pick_redis_url(None, &config), "redis://cfg:6379/0");
        assert_eq!(pick_redis_url(Some(" "), &config), "redis://cfg:6379/0");
        assert_eq!(
            pick_redis_url(Some("redis://env:6379/1"), &config),
            "redis://env:6379/1"
        );
    }

    #[test]
    fn missing_file_loads_defaults() {
        let path = std::env::temp_dir()
            .join(format!("wecom-logger-missing-{}", uuid::Uuid::new_v4()))
            .join("config.json");
        let (config, used) = load_config(Some(path.clone())).unwrap();
        assert_eq!(used, path);
        assert_eq!(config.stream_max_len, DEFAULT_STREAM_MAX_LEN);
    }
}
