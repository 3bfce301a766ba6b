//! Redis sink: `RPUSH` to the global list, then `XADD ... MAXLEN ~` to the per-agent stream.
//!
//! The two writes are independent; if the second fails the first is not rolled back.

use super::{RecordSink, SinkError};
use crate::config::{self, Config};
use crate::record::{Destinations, LogRecord};
use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use tokio::sync::OnceCell;

/// Sink backed by a reconnecting Redis connection, opened on first write.
pub struct RedisSink {
    url: String,
    settings: config::RedisConfig,
    conn: OnceCell<ConnectionManager>,
}

impl RedisSink {
    pub fn new(url: impl Into<String>, settings: &config::RedisConfig) -> Self {
        Self {
            url: url.into(),
            settings: settings.clone(),
            conn: OnceCell::new(),
        }
    }

    /// Sink for the configured (or REDIS_URL) server.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config::resolve_redis_url(config), &config.redis)
    }

    async fn connection(&self) -> Result<ConnectionManager, SinkError> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                let client = redis::Client::open(self.url.as_str()).map_err(SinkError::Connect)?;
                let manager_config = ConnectionManagerConfig::new()
                    .set_connection_timeout(self.settings.connect_timeout())
                    .set_response_timeout(self.settings.response_timeout())
                    .set_number_of_retries(self.settings.connect_retries);
                log::debug!("redis sink: connecting");
                ConnectionManager::new_with_config(client, manager_config)
                    .await
                    .map_err(SinkError::Connect)
            })
            .await?;
        Ok(conn.clone())
    }
}

/// `RPUSH <list_key> <payload>`
fn rpush_cmd(dest: &Destinations, payload: &str) -> redis::Cmd {
    let mut cmd = redis::cmd("RPUSH");
    cmd.arg(&dest.list_key).arg(payload);
    cmd
}

/// `XADD <stream_key> MAXLEN ~ <max> * <field> <value> ...`
fn xadd_cmd(dest: &Destinations, fields: &[(&str, String)]) -> redis::Cmd {
    let mut cmd = redis::cmd("XADD");
    cmd.arg(&dest.stream_key)
        .arg("MAXLEN")
        .arg("~")
        .arg(dest.stream_max_len)
        .arg("*");
    for (field, value) in fields {
        cmd.arg(*field).arg(value);
    }
    cmd
}

#[async_trait]
impl RecordSink for RedisSink {
    async fn append(&self, dest: &Destinations, record: &LogRecord) -> Result<(), SinkError> {
        let payload = record.to_payload()?;
        let mut conn = self.connection().await?;

        let _len: i64 = rpush_cmd(dest, &payload)
            .query_async(&mut conn)
            .await
            .map_err(|source| SinkError::Command {
                command: "RPUSH",
                source,
            })?;

        let _id: String = xadd_cmd(dest, &record.stream_fields(&payload))
            .query_async(&mut conn)
            .await
            .map_err(|source| SinkError::Command {
                command: "XADD",
                source,
            })?;
        Ok(())
    }
}
