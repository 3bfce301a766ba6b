//! Initialize the configuration directory: create the config directory and a default `config.json`.

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::{self, Config};

/// Default config written by `init`: every key spelled out so operators can edit in place.
pub fn default_config_json() -> Result<String> {
    let config = Config {
        redis_key: Some(config::DEFAULT_LIST_KEY.to_string()),
        redis_stream_prefix: Some(config::DEFAULT_STREAM_PREFIX.to_string()),
        redis: config::RedisConfig {
            url: Some(config::DEFAULT_REDIS_URL.to_string()),
            ..config::RedisConfig::default()
        },
        ..Config::default()
    };
    serde_json::to_string_pretty(&config).context("serializing default config")
}

/// Create the config directory and default config file if they do not exist.
/// Returns true when a new file was written.
pub fn init_config_file(config_path: &Path) -> Result<bool> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if config_path.exists() {
        log::debug!("config already exists at {}, skipping", config_path.display());
        return Ok(false);
    }
    std::fs::write(config_path, default_config_json()?)
        .with_context(|| format!("writing default config to {}", config_path.display()))?;
    log::info!("created default config at {}", config_path.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_once_and_loads_back() {
        let dir = std::env::temp_dir().join(format!("wecom-logger-init-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("config.json");

        assert!(init_config_file(&path).unwrap());
        assert!(!init_config_file(&path).unwrap());

        let (loaded, _) = config::load_config(Some(path)).unwrap();
        assert_eq!(loaded.redis_key.as_deref(), Some(config::DEFAULT_LIST_KEY));
        assert_eq!(loaded.redis.url.as_deref(), Some(config::DEFAULT_REDIS_URL));
        let _ = std::fs::remove_dir_all(dir);
    }
}
