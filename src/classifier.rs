//! Inbound payload classification
//!
//! Agent payloads are untyped JSON objects that may structurally match more
//! than one shape. Classification is a strict priority order and never fails:
//! anything unrecognised becomes [`MessageKind::Unknown`].

use crate::message::{
    ContentType, Message, MessageBody, MessageId, MessageKind, QuickReplyAction, QuickReplyOption,
};
use serde_json::Value;

/// Classify a raw `bot_uttered` payload. First match wins.
pub fn classify(payload: &Value) -> MessageKind {
    let Some(fields) = payload.as_object() else {
        return MessageKind::Unknown;
    };

    // null counts as absent
    let present = |key: &str| fields.get(key).is_some_and(|v| !v.is_null());

    if present("attachment") {
        MessageKind::Attachment
    } else if present("quick_replies") {
        MessageKind::QuickReply
    } else if present("text") {
        MessageKind::Text
    } else {
        MessageKind::Unknown
    }
}

/// Build a received message from a raw payload
pub fn build_message(id: MessageId, payload: &Value) -> Message {
    let body = match classify(payload) {
        MessageKind::Attachment => attachment_body(&payload["attachment"]),
        MessageKind::QuickReply => quick_reply_body(id, payload),
        MessageKind::Text => MessageBody::Text {
            text: text_of(&payload["text"]),
        },
        MessageKind::Unknown => MessageBody::Unknown {
            raw: payload.clone(),
        },
    };
    Message::received(id, body)
}

fn attachment_body(attachment: &Value) -> MessageBody {
    MessageBody::Attachment {
        attachment_type: attachment["type"].as_str().unwrap_or("image").to_string(),
        src: attachment["payload"]["src"].as_str().map(str::to_string),
    }
}

fn quick_reply_body(id: MessageId, payload: &Value) -> MessageBody {
    let options = payload["quick_replies"]
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .enumerate()
                .map(|(option_index, entry)| QuickReplyOption {
                    content_type: content_type_of(&entry["content_type"]),
                    title: text_of(&entry["title"]),
                    payload: text_of(&entry["payload"]),
                    clicked: false,
                    action: QuickReplyAction {
                        message_id: id,
                        option_index,
                    },
                })
                .collect()
        })
        .unwrap_or_default();

    MessageBody::QuickReply {
        text: payload.get("text").map(text_of),
        options,
        clicked: false,
    }
}

fn content_type_of(value: &Value) -> ContentType {
    match value.as_str() {
        Some("image") => ContentType::Image,
        _ => ContentType::Text,
    }
}

/// Strings are taken as-is, null becomes empty, anything else its JSON form
fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
