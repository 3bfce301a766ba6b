//! Response Logger: correlate the generated reply with its cycle and persist one record.
//!
//! The persistence result is returned to the caller as a value, never raised: a Redis failure
//! is logged together with the undelivered record and the reply pipeline carries on.

use super::{EventHandler, HandlerError};
use crate::config::Config;
use crate::context::{EventContext, RecalledCycle};
use crate::events::{Event, EventKind, ReplyEvent};
use crate::record::{Destinations, LogRecord};
use crate::sink::{RecordSink, SinkError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

const LOGGER_EVENTS: &[EventKind] = &[EventKind::NormalMessageResponded];

/// Outcome of logging one reply.
#[derive(Debug)]
pub struct LoggedReply {
    pub record: LogRecord,
    pub destinations: Destinations,
    pub outcome: Result<(), SinkError>,
}

/// Broadcast after every logged reply. `error` is the rendered sink error, if the write failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyLogged {
    pub record: LogRecord,
    pub destinations: Destinations,
    pub error: Option<String>,
}

pub struct ResponseLogger {
    config: Arc<Config>,
    sink: Arc<dyn RecordSink>,
    logged_tx: broadcast::Sender<ReplyLogged>,
}

impl ResponseLogger {
    pub fn new(config: Arc<Config>, sink: Arc<dyn RecordSink>) -> Self {
        let (logged_tx, _) = broadcast::channel(64);
        Self {
            config,
            sink,
            logged_tx,
        }
    }

    /// Receive a [`ReplyLogged`] for every reply logged after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ReplyLogged> {
        self.logged_tx.subscribe()
    }

    /// Build and write the record for `reply`, then suppress default and post-order
    /// processing whether or not the write succeeded.
    pub async fn log_reply(&self, ctx: &EventContext, reply: &ReplyEvent) -> LoggedReply {
        let cycle = RecalledCycle::recall(ctx, reply).await;
        let timestamp = chrono::Utc::now().timestamp();
        let record = LogRecord::assemble(&cycle, reply.response_text.clone(), timestamp);
        let destinations = Destinations::resolve(&self.config, &record.internal_agent_id);

        let outcome = self.sink.append(&destinations, &record).await;
        match &outcome {
            Ok(()) => {
                log::info!(
                    "reply logged: {} -> {}, stream {}",
                    record.external_customer_id,
                    record.internal_agent_id,
                    destinations.stream_key
                );
            }
            Err(e) => {
                let payload = record
                    .to_payload()
                    .unwrap_or_else(|_| format!("{:?}", record));
                log::error!("reply log write failed: {}; record: {}", e, payload);
            }
        }

        // No subscribers is fine.
        let _ = self.logged_tx.send(ReplyLogged {
            record: record.clone(),
            destinations: destinations.clone(),
            error: outcome.as_ref().err().map(|e| e.to_string()),
        });

        ctx.prevent_default();
        ctx.prevent_postorder();

        LoggedReply {
            record,
            destinations,
            outcome,
        }
    }
}

#[async_trait]
impl EventHandler for ResponseLogger {
    fn name(&self) -> &str {
        "response-logger"
    }

    fn events(&self) -> &[EventKind] {
        LOGGER_EVENTS
    }

    async fn handle(&self, ctx: &EventContext, event: &Event) -> Result<(), HandlerError> {
        if let Event::Responded(reply) = event {
            self.log_reply(ctx, reply).await;
        }
        Ok(())
    }
}
