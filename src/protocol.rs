//! Wire events exchanged with the agent over the duplex connection
//!
//! Events serialize adjacently tagged as `{"event": <name>, "data": <payload>}`,
//! matching the event-name/payload pairs of the underlying socket.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// What the user says: free text or a structured payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Utterance {
    Text(String),
    Structured(Value),
}

impl Utterance {
    /// Text recorded in the local history for this utterance
    pub fn display_text(&self) -> String {
        match self {
            Utterance::Text(text) => text.clone(),
            Utterance::Structured(value) => value.to_string(),
        }
    }
}

impl fmt::Display for Utterance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_text())
    }
}

impl From<&str> for Utterance {
    fn from(text: &str) -> Self {
        Utterance::Text(text.to_string())
    }
}

impl From<String> for Utterance {
    fn from(text: String) -> Self {
        Utterance::Text(text)
    }
}

impl From<Value> for Utterance {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => Utterance::Text(text),
            other => Utterance::Structured(other),
        }
    }
}

/// `session_request` payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// `user_uttered` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserUttered {
    pub session_id: String,
    pub message: Utterance,
}

/// Events the client emits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutboundEvent {
    SessionRequest(SessionRequest),
    UserUttered(UserUttered),
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::SessionRequest(_) => "session_request",
            OutboundEvent::UserUttered(_) => "user_uttered",
        }
    }
}

/// Lifecycle and inbound events delivered by the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum TransportEvent {
    Connect,
    Disconnect(String),
    Error(String),
    SessionConfirm(#[serde(deserialize_with = "session_id_from_payload")] String),
    BotUttered(Value),
}

impl TransportEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TransportEvent::Connect => "connect",
            TransportEvent::Disconnect(_) => "disconnect",
            TransportEvent::Error(_) => "error",
            TransportEvent::SessionConfirm(_) => "session_confirm",
            TransportEvent::BotUttered(_) => "bot_uttered",
        }
    }
}

/// Servers confirm either with the bare id or with `{"session_id": id}`
fn session_id_from_payload<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Confirm {
        Id(String),
        Object { session_id: String },
    }

    Ok(match Confirm::deserialize(deserializer)? {
        Confirm::Id(id) | Confirm::Object { session_id: id } => id,
    })
}
