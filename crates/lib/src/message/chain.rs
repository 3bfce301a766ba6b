//! Message chain segment types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Source marker: carries the platform message identifier under one of several field names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msgid: Option<serde_json::Value>,
}

impl SourceMeta {
    /// Source with a plain string id.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(serde_json::Value::String(id.into())),
            ..Self::default()
        }
    }

    /// Candidate identifier fields in lookup order.
    pub(crate) fn candidates(&self) -> [Option<&serde_json::Value>; 4] {
        [
            self.id.as_ref(),
            self.message_id.as_ref(),
            self.msg_id.as_ref(),
            self.msgid.as_ref(),
        ]
    }
}

/// One content segment of an inbound message. Wire form: `{"type": "Plain", "text": "hi"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Segment {
    Source(SourceMeta),
    Plain {
        text: String,
    },
    Image,
    File,
    Voice,
    /// Any segment kind the logger does not classify (mentions, quotes, faces, ...).
    #[serde(other)]
    Other,
}

impl Segment {
    pub fn plain(text: impl Into<String>) -> Self {
        Segment::Plain { text: text.into() }
    }
}

/// Ordered sequence of segments delivered with an inbound message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageChain(pub Vec<Segment>);

impl MessageChain {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self(segments)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// All plain-text bodies concatenated in order, without separator.
    pub fn plain_text(&self) -> String {
        self.0
            .iter()
            .filter_map(|s| match s {
                Segment::Plain { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl From<Vec<Segment>> for MessageChain {
    fn from(segments: Vec<Segment>) -> Self {
        Self(segments)
    }
}

/// Kind of an inbound (or reply) message as recorded in the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    File,
    Voice,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::File => "file",
            MessageType::Voice => "voice",
        }
    }

    /// Parse the lowercase wire name; unknown names yield None.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(MessageType::Text),
            "image" => Some(MessageType::Image),
            "file" => Some(MessageType::File),
            "voice" => Some(MessageType::Voice),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
