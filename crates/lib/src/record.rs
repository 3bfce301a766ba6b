//! Log record written to Redis, and where it goes.

use crate::config::{self, Config};
use crate::context::RecalledCycle;
use crate::message::MessageType;
use serde::{Deserialize, Serialize};

/// One request/reply pair. Correlation ids and timestamp are always present; the rest may be
/// null when extraction failed upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub external_customer_id: String,
    pub internal_agent_id: String,
    /// Unix seconds.
    pub timestamp: i64,
    pub user_message_id: Option<String>,
    pub user_message_text: Option<String>,
    pub user_message_type: Option<MessageType>,
    pub reply_message_text: String,
    pub reply_message_type: MessageType,
}

impl LogRecord {
    /// Assemble from the recalled cycle and the generated reply. Replies are always text.
    pub fn assemble(cycle: &RecalledCycle, reply_text: impl Into<String>, timestamp: i64) -> Self {
        Self {
            external_customer_id: cycle.external_customer_id.clone(),
            internal_agent_id: cycle.internal_agent_id.clone(),
            timestamp,
            user_message_id: cycle.origin_message_id.clone(),
            user_message_text: cycle.origin_message_text.clone(),
            user_message_type: cycle.origin_message_type,
            reply_message_text: reply_text.into(),
            reply_message_type: MessageType::Text,
        }
    }

    /// Compact JSON; non-ASCII text is written as-is.
    pub fn to_payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Stream entry fields: the payload plus denormalized copies for consumers that filter
    /// without parsing it.
    pub fn stream_fields(&self, payload: &str) -> Vec<(&'static str, String)> {
        vec![
            ("payload", payload.to_string()),
            ("external_customer_id", self.external_customer_id.clone()),
            ("internal_agent_id", self.internal_agent_id.clone()),
            ("timestamp", self.timestamp.to_string()),
            (
                "user_message_type",
                self.user_message_type
                    .map(|t| t.as_str().to_string())
                    .unwrap_or_default(),
            ),
            ("reply_message_type", self.reply_message_type.as_str().to_string()),
        ]
    }
}

/// Keys a record is written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destinations {
    pub list_key: String,
    pub stream_key: String,
    pub stream_max_len: usize,
}

impl Destinations {
    pub fn resolve(config: &Config, internal_agent_id: &str) -> Self {
        Self {
            list_key: config::resolve_list_key(config),
            stream_key: config::stream_key(config, internal_agent_id),
            stream_max_len: config.stream_max_len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cycle() -> RecalledCycle {
        RecalledCycle {
            internal_agent_id: "A1".to_string(),
            external_customer_id: "C1".to_string(),
            origin_message_id: None,
            origin_message_type: Some(MessageType::Image),
            origin_message_text: Some("你好".to_string()),
        }
    }

    #[test]
    fn payload_keeps_field_order_nulls_and_unicode() {
        let record = LogRecord::assemble(&cycle(), "Hi there", 1_700_000_000);
        let payload = record.to_payload().unwrap();
        assert_eq!(
            payload,
            r#"{"external_customer_id":"C1","internal_agent_id":"A1","timestamp":1700000000,"user_message_id":null,"user_message_text":"你好","user_message_type":"image","reply_message_text":"Hi there","reply_message_type":"text"}"#
        );
    }

    #[test]
    fn stream_fields_denormalize_record() {
        let mut c = cycle();
        c.origin_message_type = None;
        let record = LogRecord::assemble(&c, "r", 42);
        let fields = record.stream_fields("{}");
        let names: Vec<&str> = fields.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            names,
            [
                "payload",
                "external_customer_id",
                "internal_agent_id",
                "timestamp",
                "user_message_type",
                "reply_message_type"
            ]
        );
        assert_eq!(fields[3].1, "42");
        assert_eq!(fields[4].1, "");
        assert_eq!(fields[5].1, "text");
    }

    #[test]
    fn destinations_follow_config() {
        let mut config = Config::default();
        let d = Destinations::resolve(&config, "A1");
        assert_eq!(d.list_key, "langbot:wecom:llm_replies");
        assert_eq!(d.stream_key, "langbot:wecom:stream:A1");
        assert_eq!(d.stream_max_len, 1000);

        config.redis_key = Some("custom:list".to_string());
        config.redis_stream_prefix = Some("custom:stream".to_string());
        let d = Destinations::resolve(&config, "A2");
        assert_eq!(d.list_key, "custom:list");
        assert_eq!(d.stream_key, "custom:stream:A2");
    }
}
