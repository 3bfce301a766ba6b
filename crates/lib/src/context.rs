//! Per-cycle scratch context and host processing signals.
//!
//! The host hands each handler an [`EventContext`]: a fallible key/value store scoped to one
//! request/response cycle plus the "prevent default" / "prevent post-order" flags. The Tap
//! writes a [`CycleContext`] into it and the Logger reads it back as a [`RecalledCycle`].

use crate::events::{InboundMessage, ReplyEvent};
use crate::message::{classify, MessageType};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

pub const VAR_INTERNAL_AGENT_ID: &str = "internal_agent_id";
pub const VAR_EXTERNAL_CUSTOMER_ID: &str = "external_customer_id";
pub const VAR_ORIGIN_MESSAGE_ID: &str = "origin_message_id";
pub const VAR_ORIGIN_MESSAGE_TYPE: &str = "origin_message_type";
pub const VAR_ORIGIN_MESSAGE_TEXT: &str = "origin_message_text";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("query var not set: {0}")]
    Missing(String),
    #[error("query var store failed: {0}")]
    Backend(String),
}

/// Query variable store supplied by the host, scoped to one cycle.
#[async_trait]
pub trait QueryVars: Send + Sync {
    async fn set_var(&self, key: &str, value: Value) -> Result<(), ContextError>;
    async fn get_var(&self, key: &str) -> Result<Value, ContextError>;
}

/// In-memory query vars (one map per cycle).
#[derive(Default)]
pub struct MemoryQueryVars {
    inner: RwLock<HashMap<String, Value>>,
}

impl MemoryQueryVars {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueryVars for MemoryQueryVars {
    async fn set_var(&self, key: &str, value: Value) -> Result<(), ContextError> {
        self.inner.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn get_var(&self, key: &str) -> Result<Value, ContextError> {
        self.inner
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| ContextError::Missing(key.to_string()))
    }
}

/// Context passed to every handler invocation of a cycle.
pub struct EventContext {
    vars: Arc<dyn QueryVars>,
    default_prevented: AtomicBool,
    postorder_prevented: AtomicBool,
}

impl EventContext {
    pub fn new(vars: Arc<dyn QueryVars>) -> Self {
        Self {
            vars,
            default_prevented: AtomicBool::new(false),
            postorder_prevented: AtomicBool::new(false),
        }
    }

    /// Context backed by a fresh [`MemoryQueryVars`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryQueryVars::new()))
    }

    pub async fn set_query_var(&self, key: &str, value: Value) -> Result<(), ContextError> {
        self.vars.set_var(key, value).await
    }

    pub async fn get_query_var(&self, key: &str) -> Result<Value, ContextError> {
        self.vars.get_var(key).await
    }

    /// Ask the host to skip its default handling of this event.
    pub fn prevent_default(&self) {
        self.default_prevented.store(true, Ordering::SeqCst);
    }

    /// Ask the host to skip handlers registered after this one.
    pub fn prevent_postorder(&self) {
        self.postorder_prevented.store(true, Ordering::SeqCst);
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented.load(Ordering::SeqCst)
    }

    pub fn is_postorder_prevented(&self) -> bool {
        self.postorder_prevented.load(Ordering::SeqCst)
    }

    /// Reset the suppression flags before the next event of the same cycle is dispatched.
    pub(crate) fn reset_signals(&self) {
        self.default_prevented.store(false, Ordering::SeqCst);
        self.postorder_prevented.store(false, Ordering::SeqCst);
    }
}

/// What the Tap extracts from an inbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleContext {
    pub internal_agent_id: Option<String>,
    pub external_customer_id: Option<String>,
    pub origin_message_id: Option<String>,
    pub origin_message_type: MessageType,
    pub origin_message_text: Option<String>,
}

impl CycleContext {
    /// Begin a cycle: pure extraction from the inbound message.
    pub fn capture(message: &InboundMessage) -> Self {
        let c = classify(message.message_chain.segments());
        Self {
            internal_agent_id: message.internal_recipient(),
            external_customer_id: message.platform_sender(),
            origin_message_id: c.message_id,
            origin_message_type: c.message_type,
            origin_message_text: c.text,
        }
    }

    /// Write into the scratch context. Ids are only written when present; origin fields are
    /// always written, absent values as null.
    pub async fn store(&self, ctx: &EventContext) -> Result<(), ContextError> {
        if let Some(id) = &self.internal_agent_id {
            ctx.set_query_var(VAR_INTERNAL_AGENT_ID, Value::String(id.clone()))
                .await?;
        }
        if let Some(id) = &self.external_customer_id {
            ctx.set_query_var(VAR_EXTERNAL_CUSTOMER_ID, Value::String(id.clone()))
                .await?;
        }
        ctx.set_query_var(VAR_ORIGIN_MESSAGE_ID, opt_string(&self.origin_message_id))
            .await?;
        ctx.set_query_var(
            VAR_ORIGIN_MESSAGE_TYPE,
            Value::String(self.origin_message_type.as_str().to_string()),
        )
        .await?;
        ctx.set_query_var(VAR_ORIGIN_MESSAGE_TEXT, opt_string(&self.origin_message_text))
            .await?;
        Ok(())
    }
}

/// What the Logger reads back at the end of a cycle. Correlation ids are always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecalledCycle {
    pub internal_agent_id: String,
    pub external_customer_id: String,
    pub origin_message_id: Option<String>,
    pub origin_message_type: Option<MessageType>,
    pub origin_message_text: Option<String>,
}

impl RecalledCycle {
    /// End a cycle: read the scratch context back.
    ///
    /// A failed or non-string id read falls back to the reply's launcher id (agent) and
    /// sender id (customer). Each origin field independently becomes None on failure.
    pub async fn recall(ctx: &EventContext, reply: &ReplyEvent) -> Self {
        let internal_agent_id = read_string(ctx, VAR_INTERNAL_AGENT_ID)
            .await
            .unwrap_or_else(|| reply.launcher_id.clone());
        let external_customer_id = read_string(ctx, VAR_EXTERNAL_CUSTOMER_ID)
            .await
            .unwrap_or_else(|| reply.sender_id.clone());
        let origin_message_type = read_string(ctx, VAR_ORIGIN_MESSAGE_TYPE)
            .await
            .and_then(|s| MessageType::parse(&s));
        Self {
            internal_agent_id,
            external_customer_id,
            origin_message_id: read_string(ctx, VAR_ORIGIN_MESSAGE_ID).await,
            origin_message_type,
            origin_message_text: read_string(ctx, VAR_ORIGIN_MESSAGE_TEXT).await,
        }
    }
}

fn opt_string(v: &Option<String>) -> Value {
    v.as_ref().map_or(Value::Null, |s| Value::String(s.clone()))
}

async fn read_string(ctx: &EventContext, key: &str) -> Option<String> {
    match ctx.get_query_var(key).await {
        Ok(Value::String(s)) => Some(s),
        Ok(_) => None,
        Err(e) => {
            log::debug!("scratch context read {}: {}", key, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LauncherType;
    use crate::message::{MessageChain, Segment, SourceMeta};
    use serde_json::json;

    struct BrokenVars;

    #[async_trait]
    impl QueryVars for BrokenVars {
        async fn set_var(&self, _key: &str, _value: Value) -> Result<(), ContextError> {
            Err(ContextError::Backend("closed".to_string()))
        }

        async fn get_var(&self, _key: &str) -> Result<Value, ContextError> {
            Err(ContextError::Backend("closed".to_string()))
        }
    }

    fn reply() -> ReplyEvent {
        ReplyEvent {
            launcher_type: LauncherType::Person,
            launcher_id: "launcher-9".to_string(),
            sender_id: "sender-9".to_string(),
            response_text: "ok".to_string(),
        }
    }

    fn inbound(chain: Vec<Segment>, payload: Option<Value>) -> InboundMessage {
        InboundMessage {
            launcher_type: LauncherType::Person,
            launcher_id: "launcher-9".to_string(),
            sender_id: "sender-9".to_string(),
            message_chain: MessageChain::new(chain),
            source_platform_object: payload,
        }
    }

    #[tokio::test]
    async fn capture_store_recall_round_trip() {
        let msg = inbound(
            vec![
                Segment::Source(SourceMeta::with_id("mid-1")),
                Segment::plain("Hello"),
            ],
            Some(json!({ "_internal_recipient": "A1", "from": "C1" })),
        );
        let ctx = EventContext::in_memory();
        CycleContext::capture(&msg).store(&ctx).await.unwrap();

        let recalled = RecalledCycle::recall(&ctx, &reply()).await;
        assert_eq!(recalled.internal_agent_id, "A1");
        assert_eq!(recalled.external_customer_id, "C1");
        assert_eq!(recalled.origin_message_id.as_deref(), Some("mid-1"));
        assert_eq!(recalled.origin_message_type, Some(MessageType::Text));
        assert_eq!(recalled.origin_message_text.as_deref(), Some("Hello"));
    }

    #[tokio::test]
    async fn absent_ids_are_not_written() {
        let msg = inbound(vec![Segment::Image], None);
        let ctx = EventContext::in_memory();
        CycleContext::capture(&msg).store(&ctx).await.unwrap();

        assert_eq!(
            ctx.get_query_var(VAR_INTERNAL_AGENT_ID).await,
            Err(ContextError::Missing(VAR_INTERNAL_AGENT_ID.to_string()))
        );
        assert_eq!(ctx.get_query_var(VAR_ORIGIN_MESSAGE_TEXT).await, Ok(Value::Null));
        assert_eq!(ctx.get_query_var(VAR_ORIGIN_MESSAGE_ID).await, Ok(Value::Null));
        assert_eq!(
            ctx.get_query_var(VAR_ORIGIN_MESSAGE_TYPE).await,
            Ok(json!("image"))
        );
    }

    #[tokio::test]
    async fn recall_on_empty_context_falls_back() {
        let ctx = EventContext::in_memory();
        let recalled = RecalledCycle::recall(&ctx, &reply()).await;
        assert_eq!(recalled.internal_agent_id, "launcher-9");
        assert_eq!(recalled.external_customer_id, "sender-9");
        assert_eq!(recalled.origin_message_id, None);
        assert_eq!(recalled.origin_message_type, None);
        assert_eq!(recalled.origin_message_text, None);
    }

    #[tokio::test]
    async fn recall_on_broken_store_falls_back() {
        let ctx = EventContext::new(Arc::new(BrokenVars));
        let recalled = RecalledCycle::recall(&ctx, &reply()).await;
        assert_eq!(recalled.internal_agent_id, "launcher-9");
        assert_eq!(recalled.external_customer_id, "sender-9");
        assert_eq!(recalled.origin_message_text, None);
    }

    #[tokio::test]
    async fn null_id_falls_back_like_a_failed_read() {
        let ctx = EventContext::in_memory();
        ctx.set_query_var(VAR_INTERNAL_AGENT_ID, Value::Null).await.unwrap();
        let recalled = RecalledCycle::recall(&ctx, &reply()).await;
        assert_eq!(recalled.internal_agent_id, "launcher-9");
    }

    #[test]
    fn signals_start_clear_and_latch() {
        let ctx = EventContext::in_memory();
        assert!(!ctx.is_default_prevented());
        assert!(!ctx.is_postorder_prevented());
        ctx.prevent_default();
        assert!(ctx.is_default_prevented());
        assert!(!ctx.is_postorder_prevented());
        ctx.prevent_postorder();
        assert!(ctx.is_postorder_prevented());
        ctx.reset_signals();
        assert!(!ctx.is_default_prevented());
    }
}
