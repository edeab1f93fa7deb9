//! Pure state transition function

use super::{ClientContext, ClientState, ConnectionState, Effect, Event};
use crate::classifier::build_message;
use crate::message::Message;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ClientState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ClientState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    #[must_use]
    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Connection is in error state, reconnect before sending")]
    ConnectionFailed,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
///
/// Given the same inputs it always produces the same state and effects,
/// apart from message timestamps. No I/O happens here.
pub fn transition(
    state: &ClientState,
    context: &ClientContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state.connection, event) {
        // ============================================================
        // Teardown
        // ============================================================
        // Any + shutdown -> Disconnected, session forgotten
        (_, Event::Shutdown) => {
            let mut next = state.clone().with_connection(ConnectionState::Disconnected);
            next.session.clear();
            Ok(TransitionResult::new(next)
                .with_effect(Effect::CloseConnection)
                .with_effect(Effect::PublishState))
        }

        // ============================================================
        // Transport lifecycle
        // ============================================================

        // Any + connect -> Connected, (re)negotiate the session
        (_, Event::TransportConnected) => {
            let mut next = state.clone().with_connection(ConnectionState::Connected);
            next.last_error = None;
            let request = next.session.request();
            Ok(TransitionResult::new(next)
                .with_effect(Effect::request_session(request))
                .with_effect(Effect::PublishState))
        }

        // Any + disconnect -> Disconnected, session kept for resumption
        (_, Event::TransportDisconnected { reason }) => {
            tracing::debug!(%reason, "Transport disconnected");
            Ok(
                TransitionResult::new(state.clone().with_connection(ConnectionState::Disconnected))
                    .with_effect(Effect::PublishState),
            )
        }

        // Any + error -> Error
        (_, Event::TransportFailed { message }) => {
            let mut next = state.clone().with_connection(ConnectionState::Error);
            next.last_error = Some(message);
            Ok(TransitionResult::new(next).with_effect(Effect::PublishState))
        }

        // ============================================================
        // Session handshake
        // ============================================================
        (current, Event::SessionConfirmed { session_id }) if current.is_online() => {
            let mut next = state.clone();
            let initial = next
                .session
                .confirm(session_id, context.send_on_connect.as_ref());
            Ok(TransitionResult::new(next)
                .with_effect(Effect::PublishState)
                .with_effects(initial.map(|message| Effect::SendInitialUtterance { message })))
        }

        // ============================================================
        // Outbound utterances
        // ============================================================
        (ConnectionState::Error, Event::UserUttered { .. } | Event::QuickReplyClicked { .. }) => {
            Err(TransitionError::ConnectionFailed)
        }

        // Any non-error + utter -> WaitingForResponse. The log entry goes in
        // before the event goes out.
        (_, Event::UserUttered { message_id, message }) => {
            let next = state
                .clone()
                .with_connection(ConnectionState::WaitingForResponse);
            let session_id = next.session.outbound_id();
            Ok(TransitionResult::new(next)
                .with_effect(Effect::append(Message::user_text(
                    message_id,
                    message.display_text(),
                )))
                .with_effect(Effect::user_uttered(session_id, message))
                .with_effect(Effect::PublishState))
        }

        // Click resolution needs the live history; the runtime resolves it
        // and feeds the payload back in as an utterance.
        (_, Event::QuickReplyClicked { action }) => {
            Ok(TransitionResult::new(state.clone())
                .with_effect(Effect::ResolveQuickReply { action }))
        }

        // ============================================================
        // Inbound agent messages
        // ============================================================
        (current, Event::BotUttered { message_id, payload }) if current.is_online() => {
            let message = build_message(message_id, &payload);
            Ok(
                TransitionResult::new(state.clone().with_connection(ConnectionState::Connected))
                    .with_effect(Effect::append(message))
                    .with_effect(Effect::PublishState),
            )
        }

        // ============================================================
        // Invalid Transitions
        // ============================================================
        (current, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {current} with event {event:?}"
        ))),
    }
}
