//! Session handshake
//!
//! On every transport connect the client asks for a session, offering the
//! last confirmed token so the agent can resume context. The confirmed token
//! is attached to every later utterance.

use crate::protocol::{SessionRequest, Utterance};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Last token confirmed by the agent. Survives disconnects.
    pub token: Option<String>,
    /// Whether the configured initial utterance has gone out
    #[serde(default)]
    pub initial_utterance_sent: bool,
}

impl Session {
    /// Build the request sent right after the transport connects
    pub fn request(&self) -> SessionRequest {
        SessionRequest {
            session_id: self.token.clone(),
        }
    }

    /// Record a confirmed token.
    ///
    /// Returns the initial utterance to send now, at most once per session
    /// lifetime and never before the first confirmation.
    pub fn confirm(
        &mut self,
        token: impl Into<String>,
        send_on_connect: Option<&Utterance>,
    ) -> Option<Utterance> {
        self.token = Some(token.into());
        if self.initial_utterance_sent {
            return None;
        }
        let initial = send_on_connect.cloned()?;
        self.initial_utterance_sent = true;
        Some(initial)
    }

    /// Token to put on outbound utterances, empty before the first confirm
    pub fn outbound_id(&self) -> String {
        self.token.clone().unwrap_or_default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
