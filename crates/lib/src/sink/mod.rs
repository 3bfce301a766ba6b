//! Record persistence.
//!
//! The Logger hands each record to a [`RecordSink`]; failures come back as [`SinkError`] and
//! the Logger decides what to do with them (log and continue).

mod memory;
mod redis;

pub use self::memory::{MemorySink, SinkWrite};
pub use self::redis::RedisSink;

use crate::record::{Destinations, LogRecord};
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("serialize record failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("redis connect failed: {0}")]
    Connect(#[source] ::redis::RedisError),
    #[error("redis {command} failed: {source}")]
    Command {
        command: &'static str,
        #[source]
        source: ::redis::RedisError,
    },
}

/// Destination for log records.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Append the record to the list and the capped stream in `dest`.
    async fn append(&self, dest: &Destinations, record: &LogRecord) -> Result<(), SinkError>;
}
