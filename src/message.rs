//! Conversation log entries
//!
//! A message is authored either by the remote agent (`received = true`) or by
//! the local user. Agent messages come in four kinds, see [`MessageBody`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Client-generated message identifier, never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The kind of a message, as decided by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Attachment,
    QuickReply,
    Unknown,
}

/// Content type of a quick reply option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[default]
    Text,
    Image,
}

/// Click descriptor carried by every quick reply option.
///
/// Resolved against the live history at click time, so a stale copy of the
/// option held by a renderer still targets the current message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuickReplyAction {
    pub message_id: MessageId,
    pub option_index: usize,
}

/// One selectable option of a quick reply group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickReplyOption {
    pub content_type: ContentType,
    pub title: String,
    pub payload: String,
    pub clicked: bool,
    pub action: QuickReplyAction,
}

/// Kind-specific message content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageBody {
    Text {
        text: String,
    },
    Attachment {
        /// Wire `attachment.type`, normally `"image"`
        attachment_type: String,
        src: Option<String>,
    },
    QuickReply {
        /// Optional lead-in text shown above the options
        text: Option<String>,
        options: Vec<QuickReplyOption>,
        clicked: bool,
    },
    /// Payload that matched no known shape, kept verbatim for the consumer
    Unknown {
        raw: Value,
    },
}

impl MessageBody {
    pub fn kind(&self) -> MessageKind {
        match self {
            MessageBody::Text { .. } => MessageKind::Text,
            MessageBody::Attachment { .. } => MessageKind::Attachment,
            MessageBody::QuickReply { .. } => MessageKind::QuickReply,
            MessageBody::Unknown { .. } => MessageKind::Unknown,
        }
    }
}

/// A single entry in the conversation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    /// `true` when authored by the agent, `false` when authored locally
    pub received: bool,
    pub created_at: DateTime<Utc>,
    pub body: MessageBody,
}

impl Message {
    /// A text message typed by the local user
    pub fn user_text(id: MessageId, text: impl Into<String>) -> Self {
        Self {
            id,
            received: false,
            created_at: Utc::now(),
            body: MessageBody::Text { text: text.into() },
        }
    }

    /// A message received from the agent
    pub fn received(id: MessageId, body: MessageBody) -> Self {
        Self {
            id,
            received: true,
            created_at: Utc::now(),
            body,
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.body.kind()
    }

    /// Text content for text messages and the lead-in of quick replies
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            MessageBody::Text { text } => Some(text),
            MessageBody::QuickReply { text, .. } => text.as_deref(),
            _ => None,
        }
    }

    /// Quick reply options, empty for any other kind
    pub fn quick_replies(&self) -> &[QuickReplyOption] {
        match &self.body {
            MessageBody::QuickReply { options, .. } => options,
            _ => &[],
        }
    }

    /// Whether this is a quick reply group that has already been answered
    pub fn is_resolved(&self) -> bool {
        matches!(self.body, MessageBody::QuickReply { clicked: true, .. })
    }
}
