//! Handler registry: register handlers and dispatch events to them in registration order.

use super::EventHandler;
use crate::context::EventContext;
use crate::events::Event;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Result of dispatching one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Handlers that ran.
    pub handled: usize,
    /// True when a handler asked the host to skip its default handling.
    pub default_prevented: bool,
}

/// Ordered handler list. Shared across the plugin.
pub struct HandlerRegistry {
    inner: Arc<RwLock<Vec<Arc<dyn EventHandler>>>>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register a handler. A handler with the same name is replaced in place.
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        let mut g = self.inner.write().await;
        if let Some(slot) = g.iter_mut().find(|h| h.name() == handler.name()) {
            *slot = handler;
        } else {
            g.push(handler);
        }
    }

    pub async fn names(&self) -> Vec<String> {
        let g = self.inner.read().await;
        g.iter().map(|h| h.name().to_string()).collect()
    }

    /// Run every handler subscribed to the event's kind, stopping once one prevents post-order
    /// processing. A failing handler is logged and does not stop the others.
    pub async fn dispatch(&self, event: &Event, ctx: &EventContext) -> DispatchOutcome {
        let kind = event.kind();
        let handlers: Vec<Arc<dyn EventHandler>> = {
            let g = self.inner.read().await;
            g.iter()
                .filter(|h| h.events().contains(&kind))
                .cloned()
                .collect()
        };

        let mut outcome = DispatchOutcome::default();
        for handler in handlers {
            log::debug!("dispatch {} -> {}", kind, handler.name());
            if let Err(e) = handler.handle(ctx, event).await {
                log::warn!("handler {} failed on {}: {}", handler.name(), kind, e);
            }
            outcome.handled += 1;
            if ctx.is_postorder_prevented() {
                log::debug!("dispatch {}: post-order prevented by {}", kind, handler.name());
                break;
            }
        }
        outcome.default_prevented = ctx.is_default_prevented();
        outcome
    }
}
