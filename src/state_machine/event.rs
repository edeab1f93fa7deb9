//! Events that drive the client state machine

use crate::message::{MessageId, QuickReplyAction};
use crate::protocol::{TransportEvent, Utterance};
use serde_json::Value;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // Transport lifecycle
    TransportConnected,
    TransportDisconnected {
        reason: String,
    },
    TransportFailed {
        message: String,
    },

    // Inbound protocol events
    SessionConfirmed {
        session_id: String,
    },
    BotUttered {
        message_id: MessageId,
        payload: Value,
    },

    // Application events
    UserUttered {
        message_id: MessageId,
        message: Utterance,
    },
    QuickReplyClicked {
        action: QuickReplyAction,
    },
    Shutdown,
}

impl From<TransportEvent> for Event {
    fn from(event: TransportEvent) -> Self {
        match event {
            TransportEvent::Connect => Event::TransportConnected,
            TransportEvent::Disconnect(reason) => Event::TransportDisconnected { reason },
            TransportEvent::Error(message) => Event::TransportFailed { message },
            TransportEvent::SessionConfirm(session_id) => Event::SessionConfirmed { session_id },
            TransportEvent::BotUttered(payload) => Event::BotUttered {
                message_id: MessageId::new(),
                payload,
            },
        }
    }
}
