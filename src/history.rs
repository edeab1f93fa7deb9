//! Ordered conversation log
//!
//! Entries are shared as `Arc<Message>` so renderers can hold snapshots.
//! Mutation goes through `Arc::make_mut`: a snapshot taken before a click
//! keeps showing the unresolved message.

use crate::message::{Message, MessageBody, MessageId};
use std::sync::Arc;
use thiserror::Error;

/// Contract violations on history mutation.
///
/// These mean the caller and the log disagree about what is displayed,
/// and are surfaced to the caller rather than swallowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("Message not found: {0}")]
    NotFound(MessageId),
    #[error("Message {0} is not a quick reply")]
    NotQuickReply(MessageId),
    #[error("Quick reply {message_id} has no option {option_index} ({len} options)")]
    OptionOutOfRange {
        message_id: MessageId,
        option_index: usize,
        len: usize,
    },
}

/// Outcome of resolving a quick reply group
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The group is now resolved on the clicked option
    Resolved { payload: String },
    /// The group was resolved by an earlier click; nothing changed
    AlreadyResolved,
}

#[derive(Debug, Default, Clone)]
pub struct HistoryStore {
    messages: Vec<Arc<Message>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) -> Arc<Message> {
        let message = Arc::new(message);
        self.messages.push(Arc::clone(&message));
        message
    }

    pub fn find_by_id(&self, id: MessageId) -> Option<&Arc<Message>> {
        self.messages.iter().find(|m| m.id == id)
    }

    fn position(&self, id: MessageId) -> Result<usize, HistoryError> {
        self.messages
            .iter()
            .position(|m| m.id == id)
            .ok_or(HistoryError::NotFound(id))
    }

    /// Mark `option_index` as the chosen option of a quick reply group.
    ///
    /// Exactly one option ends up clicked. Resolving an already resolved
    /// group is a no-op reported as [`Resolution::AlreadyResolved`].
    pub fn resolve_quick_reply(
        &mut self,
        message_id: MessageId,
        option_index: usize,
    ) -> Result<Resolution, HistoryError> {
        let pos = self.position(message_id)?;

        // Validate against the shared copy before cloning it
        match &self.messages[pos].body {
            MessageBody::QuickReply { clicked: true, .. } => {
                return Ok(Resolution::AlreadyResolved);
            }
            MessageBody::QuickReply { options, .. } if option_index >= options.len() => {
                return Err(HistoryError::OptionOutOfRange {
                    message_id,
                    option_index,
                    len: options.len(),
                });
            }
            MessageBody::QuickReply { .. } => {}
            _ => return Err(HistoryError::NotQuickReply(message_id)),
        }

        let message = Arc::make_mut(&mut self.messages[pos]);
        let MessageBody::QuickReply {
            options, clicked, ..
        } = &mut message.body
        else {
            return Err(HistoryError::NotQuickReply(message_id));
        };

        *clicked = true;
        for (index, option) in options.iter_mut().enumerate() {
            option.clicked = index == option_index;
        }

        Ok(Resolution::Resolved {
            payload: options[option_index].payload.clone(),
        })
    }

    /// Remove a message, keeping the order of the rest
    pub fn remove_by_id(&mut self, id: MessageId) -> Result<Arc<Message>, HistoryError> {
        let pos = self.position(id)?;
        Ok(self.messages.remove(pos))
    }

    /// Replace the whole log. Bypasses every invariant.
    pub fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages.into_iter().map(Arc::new).collect();
    }

    pub fn snapshot(&self) -> Vec<Arc<Message>> {
        self.messages.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Message>> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
