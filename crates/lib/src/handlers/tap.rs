//! Inbound Tap: stash routing ids and message content into the cycle's scratch context.

use super::{EventHandler, HandlerError};
use crate::context::{CycleContext, EventContext};
use crate::events::{Event, EventKind};
use async_trait::async_trait;

const TAP_EVENTS: &[EventKind] = &[
    EventKind::PersonNormalMessageReceived,
    EventKind::GroupNormalMessageReceived,
];

/// Runs on every normal direct/group message. Never suppresses further processing: reply
/// generation still has to run.
#[derive(Debug, Default)]
pub struct InboundTap;

impl InboundTap {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventHandler for InboundTap {
    fn name(&self) -> &str {
        "inbound-tap"
    }

    fn events(&self) -> &[EventKind] {
        TAP_EVENTS
    }

    async fn handle(&self, ctx: &EventContext, event: &Event) -> Result<(), HandlerError> {
        let message = match event {
            Event::PersonMessage(m) | Event::GroupMessage(m) => m,
            Event::Responded(_) => return Ok(()),
        };
        let captured = CycleContext::capture(message);
        // A failed write degrades to Logger fallbacks; nothing is surfaced.
        if let Err(e) = captured.store(ctx).await {
            log::warn!(
                "inbound-tap: storing scratch context for {} failed: {}",
                event.conversation(),
                e
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{RecalledCycle, VAR_ORIGIN_MESSAGE_TEXT};
    use crate::events::{InboundMessage, LauncherType, ReplyEvent};
    use crate::message::{MessageChain, MessageType, Segment};
    use serde_json::json;

    fn group_message(chain: Vec<Segment>) -> Event {
        Event::inbound(InboundMessage {
            launcher_type: LauncherType::Group,
            launcher_id: "G1".to_string(),
            sender_id: "U1".to_string(),
            message_chain: MessageChain::new(chain),
            source_platform_object: Some(json!({ "_internal_recipient": "A7", "from": "C7" })),
        })
    }

    #[tokio::test]
    async fn stores_context_and_leaves_processing_enabled() {
        let ctx = EventContext::in_memory();
        let event = group_message(vec![Segment::Voice, Segment::plain("transcript")]);
        InboundTap::new().handle(&ctx, &event).await.unwrap();

        assert!(!ctx.is_default_prevented());
        assert!(!ctx.is_postorder_prevented());

        let reply = ReplyEvent {
            launcher_type: LauncherType::Group,
            launcher_id: "G1".to_string(),
            sender_id: "U1".to_string(),
            response_text: "ok".to_string(),
        };
        let recalled = RecalledCycle::recall(&ctx, &reply).await;
        assert_eq!(recalled.internal_agent_id, "A7");
        assert_eq!(recalled.external_customer_id, "C7");
        assert_eq!(recalled.origin_message_type, Some(MessageType::Voice));
        assert_eq!(recalled.origin_message_text.as_deref(), Some("transcript"));
    }

    #[tokio::test]
    async fn ignores_reply_events() {
        let ctx = EventContext::in_memory();
        let event = Event::Responded(ReplyEvent {
            launcher_type: LauncherType::Person,
            launcher_id: "L".to_string(),
            sender_id: "S".to_string(),
            response_text: "r".to_string(),
        });
        InboundTap::new().handle(&ctx, &event).await.unwrap();
        assert!(ctx.get_query_var(VAR_ORIGIN_MESSAGE_TEXT).await.is_err());
    }
}
