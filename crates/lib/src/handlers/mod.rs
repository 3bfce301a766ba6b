//! Event handlers: the inbound Tap, the reply Logger, and the registry that dispatches to them.

mod logger;
mod registry;
mod tap;

pub use logger::{LoggedReply, ReplyLogged, ResponseLogger};
pub use registry::{DispatchOutcome, HandlerRegistry};
pub use tap::InboundTap;

use crate::context::{ContextError, EventContext};
use crate::events::{Event, EventKind};
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("scratch context: {0}")]
    Context(#[from] ContextError),
    #[error("{0}")]
    Other(String),
}

/// A handler subscribed to one or more event kinds.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handler name (for logs and registry replacement).
    fn name(&self) -> &str;
    /// Event kinds this handler is invoked for.
    fn events(&self) -> &[EventKind];
    /// Handle one event within its cycle's context.
    async fn handle(&self, ctx: &EventContext, event: &Event) -> Result<(), HandlerError>;
}
