//! Connection-verification utilities for operators: exercise the same Redis settings the
//! plugin uses before deploying it. Not called by the handlers.

use crate::config::{self, Config, RedisConfig};
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::RedisError;
use std::time::Duration;

pub const CHECK_TEST_KEY: &str = "langbot:test:connection";
pub const CHECK_TEST_STREAM: &str = "langbot:test:stream";

#[derive(Debug, thiserror::Error)]
pub enum DiagnosticError {
    #[error("connection error: {0}")]
    Connection(#[source] RedisError),
    #[error("timeout: {0}")]
    Timeout(#[source] RedisError),
    #[error("unexpected error: {0}")]
    Other(#[source] RedisError),
}

impl From<RedisError> for DiagnosticError {
    fn from(e: RedisError) -> Self {
        if e.is_timeout() {
            DiagnosticError::Timeout(e)
        } else if e.is_connection_refusal() || e.is_connection_dropped() || e.is_io_error() {
            DiagnosticError::Connection(e)
        } else {
            DiagnosticError::Other(e)
        }
    }
}

impl DiagnosticError {
    /// Operator hints printed after a failure.
    pub fn hints(&self) -> &'static [&'static str] {
        match self {
            DiagnosticError::Connection(_) => &[
                "Redis server is running (redis-cli ping)",
                "Redis is listening on the configured host and port",
                "no firewall is blocking the connection",
            ],
            DiagnosticError::Timeout(_) => &[
                "Redis server is too slow to respond",
                "network issues between this host and Redis",
            ],
            DiagnosticError::Other(_) => &[],
        }
    }
}

/// URL to verify: explicit argument, else REDIS_URL, else the config's `redis.url`, else the
/// default.
pub fn resolve_check_url(arg: Option<String>, config: &Config) -> String {
    pick_check_url(
        arg,
        std::env::var("REDIS_URL").ok(),
        config.redis.url.as_deref(),
    )
}

fn pick_check_url(arg: Option<String>, env: Option<String>, configured: Option<&str>) -> String {
    arg.filter(|s| !s.trim().is_empty())
        .or_else(|| env.filter(|s| !s.trim().is_empty()))
        .or_else(|| {
            configured
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| config::DEFAULT_REDIS_URL.to_string())
}

/// Hide credentials: `redis://:secret@host:6379/0` -> `redis://***@host:6379/0`.
pub fn mask_url(url: &str) -> String {
    let parts: Vec<&str> = url.split('@').collect();
    if let [auth, host] = parts.as_slice() {
        if let Some((scheme, _)) = auth.split_once("//") {
            return format!("{}//***@{}", scheme, host);
        }
    }
    url.to_string()
}

/// What [`check_connection`] touches and how long it waits before the final liveness check.
#[derive(Debug, Clone)]
pub struct CheckOptions {
    pub test_key: String,
    pub test_stream: String,
    pub settle: Duration,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            test_key: CHECK_TEST_KEY.to_string(),
            test_stream: CHECK_TEST_STREAM.to_string(),
            settle: Duration::from_secs(5),
        }
    }
}

async fn connect(url: &str, settings: &RedisConfig) -> Result<ConnectionManager, DiagnosticError> {
    let client = redis::Client::open(url)?;
    let manager_config = ConnectionManagerConfig::new()
        .set_connection_timeout(settings.connect_timeout())
        .set_response_timeout(settings.response_timeout())
        .set_number_of_retries(settings.connect_retries);
    Ok(ConnectionManager::new_with_config(client, manager_config).await?)
}

async fn ping(conn: &mut ConnectionManager) -> Result<(), DiagnosticError> {
    let _pong: String = redis::cmd("PING").query_async(conn).await?;
    Ok(())
}

/// Connect, PING, SET/GET/DEL a test key, XADD to a capped test stream, clean up, then PING
/// again after `opts.settle`. Each completed step is passed to `report`.
pub async fn check_connection(
    url: &str,
    settings: &RedisConfig,
    opts: &CheckOptions,
    report: &mut (dyn FnMut(&str) + Send),
) -> Result<(), DiagnosticError> {
    let mut conn = connect(url, settings).await?;
    report("redis client created");

    ping(&mut conn).await?;
    report("PING ok");

    let _: () = redis::cmd("SET")
        .arg(&opts.test_key)
        .arg("test_value")
        .arg("EX")
        .arg(60)
        .query_async(&mut conn)
        .await?;
    report(&format!("SET {} ok", opts.test_key));

    let value: Option<String> = redis::cmd("GET")
        .arg(&opts.test_key)
        .query_async(&mut conn)
        .await?;
    report(&format!(
        "GET {} = {}",
        opts.test_key,
        value.as_deref().unwrap_or("(nil)")
    ));

    let _: i64 = redis::cmd("DEL")
        .arg(&opts.test_key)
        .query_async(&mut conn)
        .await?;
    report(&format!("DEL {} ok", opts.test_key));

    let id: String = redis::cmd("XADD")
        .arg(&opts.test_stream)
        .arg("MAXLEN")
        .arg("~")
        .arg(10)
        .arg("*")
        .arg("test")
        .arg("data")
        .arg("timestamp")
        .arg("123456")
        .query_async(&mut conn)
        .await?;
    report(&format!("XADD {} ok, id {}", opts.test_stream, id));

    let _: i64 = redis::cmd("DEL")
        .arg(&opts.test_stream)
        .query_async(&mut conn)
        .await?;
    report("cleanup ok");

    tokio::time::sleep(opts.settle).await;
    ping(&mut conn).await?;
    report(&format!("PING after {}s ok", opts.settle.as_secs()));
    Ok(())
}

/// PING every `interval` for `rounds` rounds on one connection; stops at the first failure.
pub async fn health_loop(
    url: &str,
    settings: &RedisConfig,
    rounds: usize,
    interval: Duration,
    report: &mut (dyn FnMut(&str) + Send),
) -> Result<(), DiagnosticError> {
    let mut conn = connect(url, settings).await?;
    for round in 1..=rounds {
        tokio::time::sleep(interval).await;
        if let Err(e) = ping(&mut conn).await {
            report(&format!("health check {}/{} failed: {}", round, rounds, e));
            return Err(e);
        }
        report(&format!(
            "health check {}/{} (after {}s) ok",
            round,
            rounds,
            interval.as_secs() * round as u64
        ));
    }
    Ok(())
}
