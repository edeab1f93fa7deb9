//! Quick reply click handling
//!
//! A click resolves the group and sends the option payload. Command payloads
//! (leading `/`) keep the resolved message visible, free text removes it.

use crate::history::{HistoryError, HistoryStore, Resolution};
use crate::message::{MessageId, QuickReplyAction};

/// Payload prefix marking an intent directive rather than free text
pub const COMMAND_PREFIX: char = '/';

/// What a click did to the history
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Command payload: the message stays, resolved on the clicked option
    Retained { payload: String },
    /// Free-text payload: the message was removed from the log
    Removed { payload: String },
    /// The group was already answered; nothing is sent
    Ignored,
}

impl ClickOutcome {
    /// Payload to utter, if the click produced one
    pub fn payload(&self) -> Option<&str> {
        match self {
            ClickOutcome::Retained { payload } | ClickOutcome::Removed { payload } => Some(payload),
            ClickOutcome::Ignored => None,
        }
    }
}

pub fn is_command(payload: &str) -> bool {
    payload.starts_with(COMMAND_PREFIX)
}

/// Apply a click to the history.
///
/// The caller must utter the returned payload within the same dispatch task
/// so that nothing observes the intermediate state.
pub fn resolve_click(
    history: &mut HistoryStore,
    action: QuickReplyAction,
) -> Result<ClickOutcome, HistoryError> {
    let QuickReplyAction {
        message_id,
        option_index,
    } = action;

    let payload = match history.resolve_quick_reply(message_id, option_index)? {
        Resolution::Resolved { payload } => payload,
        Resolution::AlreadyResolved => {
            tracing::debug!(%message_id, option_index, "Ignoring click on resolved quick reply");
            return Ok(ClickOutcome::Ignored);
        }
    };

    if is_command(&payload) {
        Ok(ClickOutcome::Retained { payload })
    } else {
        remove(history, message_id)?;
        Ok(ClickOutcome::Removed { payload })
    }
}

fn remove(history: &mut HistoryStore, message_id: MessageId) -> Result<(), HistoryError> {
    history.remove_by_id(message_id).map(|_| ())
}
