//! In-process sink: keeps every write in memory (dry runs and tests).

use super::{RecordSink, SinkError};
use crate::record::{Destinations, LogRecord};
use async_trait::async_trait;
use tokio::sync::Mutex;

/// One record as it would have been written: the list push and the stream entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkWrite {
    pub list_key: String,
    pub stream_key: String,
    pub stream_max_len: usize,
    pub payload: String,
    pub stream_fields: Vec<(&'static str, String)>,
}

#[derive(Default)]
pub struct MemorySink {
    writes: Mutex<Vec<SinkWrite>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn writes(&self) -> Vec<SinkWrite> {
        self.writes.lock().await.clone()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn append(&self, dest: &Destinations, record: &LogRecord) -> Result<(), SinkError> {
        let payload = record.to_payload()?;
        let stream_fields = record.stream_fields(&payload);
        self.writes.lock().await.push(SinkWrite {
            list_key: dest.list_key.clone(),
            stream_key: dest.stream_key.clone(),
            stream_max_len: dest.stream_max_len,
            payload,
            stream_fields,
        });
        Ok(())
    }
}
