//! Effects produced by state transitions

use crate::message::{Message, QuickReplyAction};
use crate::protocol::{OutboundEvent, SessionRequest, UserUttered, Utterance};

/// Effects to be executed after state transition
#[derive(Debug, Clone)]
pub enum Effect {
    /// Send an event over the connection (fire-and-forget)
    Emit(OutboundEvent),

    /// Append a message to the history
    AppendMessage { message: Message },

    /// Utter the configured initial message, after the handshake
    SendInitialUtterance { message: Utterance },

    /// Resolve a quick reply click against the live history
    ResolveQuickReply { action: QuickReplyAction },

    /// Release the connection
    CloseConnection,

    /// Publish the new state to observers
    PublishState,
}

impl Effect {
    pub fn request_session(request: SessionRequest) -> Self {
        Effect::Emit(OutboundEvent::SessionRequest(request))
    }

    pub fn user_uttered(session_id: String, message: Utterance) -> Self {
        Effect::Emit(OutboundEvent::UserUttered(UserUttered {
            session_id,
            message,
        }))
    }

    pub fn append(message: Message) -> Self {
        Effect::AppendMessage { message }
    }
}
