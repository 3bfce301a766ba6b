//! Host events the plugin subscribes to.
//!
//! The host delivers a normal (non-command) message from a direct or group conversation,
//! runs reply generation, then delivers the generated reply for the same conversation.

use crate::message::MessageChain;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform payload field holding the internal recipient (agent) id.
pub const FIELD_INTERNAL_RECIPIENT: &str = "_internal_recipient";
/// Platform payload field holding the sender (customer) id.
pub const FIELD_SENDER: &str = "from";

/// Event kinds handlers subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    PersonNormalMessageReceived,
    GroupNormalMessageReceived,
    NormalMessageResponded,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Direct or group conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LauncherType {
    Person,
    Group,
}

/// Conversation a cycle belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    pub launcher_type: LauncherType,
    pub launcher_id: String,
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = match self.launcher_type {
            LauncherType::Person => "person",
            LauncherType::Group => "group",
        };
        write!(f, "{}_{}", t, self.launcher_id)
    }
}

/// A normal inbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub launcher_type: LauncherType,
    pub launcher_id: String,
    pub sender_id: String,
    #[serde(default)]
    pub message_chain: MessageChain,
    /// Raw platform payload, when the adapter exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_platform_object: Option<serde_json::Value>,
}

impl InboundMessage {
    /// Internal recipient from the platform payload.
    pub fn internal_recipient(&self) -> Option<String> {
        self.platform_field(FIELD_INTERNAL_RECIPIENT)
    }

    /// Sender from the platform payload.
    pub fn platform_sender(&self) -> Option<String> {
        self.platform_field(FIELD_SENDER)
    }

    /// String or numeric field of the platform payload; empty strings count as absent.
    fn platform_field(&self, name: &str) -> Option<String> {
        let value = self.source_platform_object.as_ref()?.get(name)?;
        match value {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// The generated reply for a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyEvent {
    pub launcher_type: LauncherType,
    pub launcher_id: String,
    pub sender_id: String,
    pub response_text: String,
}

/// Event delivered by the host.
#[derive(Debug, Clone)]
pub enum Event {
    PersonMessage(InboundMessage),
    GroupMessage(InboundMessage),
    Responded(ReplyEvent),
}

impl Event {
    /// Wrap an inbound message in the event matching its launcher type.
    pub fn inbound(message: InboundMessage) -> Self {
        match message.launcher_type {
            LauncherType::Person => Event::PersonMessage(message),
            LauncherType::Group => Event::GroupMessage(message),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::PersonMessage(_) => EventKind::PersonNormalMessageReceived,
            Event::GroupMessage(_) => EventKind::GroupNormalMessageReceived,
            Event::Responded(_) => EventKind::NormalMessageResponded,
        }
    }

    pub fn conversation(&self) -> ConversationKey {
        match self {
            Event::PersonMessage(m) | Event::GroupMessage(m) => ConversationKey {
                launcher_type: m.launcher_type,
                launcher_id: m.launcher_id.clone(),
            },
            Event::Responded(r) => ConversationKey {
                launcher_type: r.launcher_type,
                launcher_id: r.launcher_id.clone(),
            },
        }
    }
}
