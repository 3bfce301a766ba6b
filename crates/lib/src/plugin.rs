//! Plugin assembly: registers the Tap and the Logger and drives one cycle per conversation.

use crate::config::Config;
use crate::cycle::CycleTracker;
use crate::events::Event;
use crate::handlers::{DispatchOutcome, HandlerRegistry, InboundTap, ReplyLogged, ResponseLogger};
use crate::sink::{RecordSink, RedisSink};
use std::sync::Arc;
use tokio::sync::broadcast;

pub struct Plugin {
    registry: HandlerRegistry,
    cycles: CycleTracker,
    logger: Arc<ResponseLogger>,
}

impl Plugin {
    /// Register the Tap, then the Logger, writing through `sink`.
    pub async fn new(config: Config, sink: Arc<dyn RecordSink>) -> Self {
        let cycles = CycleTracker::with_limit(config.max_pending_cycles);
        let logger = Arc::new(ResponseLogger::new(Arc::new(config), sink));
        let registry = HandlerRegistry::new();
        registry.register(Arc::new(InboundTap::new())).await;
        registry.register(logger.clone()).await;
        Self {
            registry,
            cycles,
            logger,
        }
    }

    /// Plugin writing to the configured Redis server. The connection opens on the first reply.
    pub async fn from_config(config: Config) -> Self {
        let sink = Arc::new(RedisSink::from_config(&config));
        Self::new(config, sink).await
    }

    /// Deliver one host event. Inbound messages begin their conversation's cycle; replies
    /// finish it.
    pub async fn on_event(&self, event: &Event) -> DispatchOutcome {
        let key = event.conversation();
        let ctx = match event {
            Event::PersonMessage(_) | Event::GroupMessage(_) => self.cycles.begin(key).await,
            Event::Responded(_) => self.cycles.finish(&key).await,
        };
        self.registry.dispatch(event, &ctx).await
    }

    /// Cycles still awaiting a reply.
    pub async fn pending_cycles(&self) -> usize {
        self.cycles.pending().await
    }

    /// Receive every reply the Logger handles from now on, with its write result.
    pub fn subscribe(&self) -> broadcast::Receiver<ReplyLogged> {
        self.logger.subscribe()
    }
}
