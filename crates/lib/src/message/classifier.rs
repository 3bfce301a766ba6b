//! Pure classification of an inbound chain into (type, id, text).

use super::chain::{MessageType, Segment, SourceMeta};

/// What the logger keeps from an inbound chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub message_type: MessageType,
    pub message_id: Option<String>,
    /// Concatenated plain text; None when the chain has no plain segment.
    pub text: Option<String>,
}

/// Classify a chain in one ordered pass.
///
/// Image, file and voice segments overwrite the type in encounter order, so the last
/// non-text kind wins; plain segments never reset it back to text. The message id comes
/// from the last source segment that carries one.
pub fn classify(segments: &[Segment]) -> Classification {
    let mut out = Classification::default();
    let mut text_parts: Vec<&str> = Vec::new();

    for segment in segments {
        match segment {
            Segment::Source(meta) => {
                if let Some(id) = source_id(meta) {
                    out.message_id = Some(id);
                }
            }
            Segment::Image => out.message_type = MessageType::Image,
            Segment::File => out.message_type = MessageType::File,
            Segment::Voice => out.message_type = MessageType::Voice,
            Segment::Plain { text } => text_parts.push(text),
            Segment::Other => {}
        }
    }

    if !text_parts.is_empty() {
        out.text = Some(text_parts.concat());
    }
    out
}

/// First non-null candidate field, stringified.
fn source_id(meta: &SourceMeta) -> Option<String> {
    meta.candidates()
        .into_iter()
        .flatten()
        .find(|v| !v.is_null())
        .map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
}
