//! Client state types

use crate::config::ClientConfig;
use crate::protocol::Utterance;
use crate::session::Session;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection state as seen by the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Transport is being opened
    #[default]
    Connecting,
    /// Transport is up, nothing outstanding
    Connected,
    /// An utterance went out and no agent message has arrived since
    WaitingForResponse,
    /// Transport dropped; the session token is kept for resumption
    Disconnected,
    /// Transport reported an error
    Error,
}

impl ConnectionState {
    /// Whether agent messages can arrive in this state
    pub fn is_online(self) -> bool {
        matches!(self, Self::Connected | Self::WaitingForResponse)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::WaitingForResponse => "waiting_for_response",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the transition function may change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientState {
    pub connection: ConnectionState,
    pub session: Session,
    /// Message of the last transport error, cleared on reconnect
    #[serde(default)]
    pub last_error: Option<String>,
}

impl ClientState {
    #[must_use]
    pub fn with_connection(mut self, connection: ConnectionState) -> Self {
        self.connection = connection;
        self
    }
}

/// Immutable configuration visible to the transition function
#[derive(Debug, Clone, Default)]
pub struct ClientContext {
    pub send_on_connect: Option<Utterance>,
}

impl From<&ClientConfig> for ClientContext {
    fn from(config: &ClientConfig) -> Self {
        Self {
            send_on_connect: config.send_on_connect.clone(),
        }
    }
}
