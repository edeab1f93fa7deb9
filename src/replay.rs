//! Scripted session replay
//!
//! Drives a [`ChatClient`] from a JSON-lines script. Each line is either an
//! inbound wire event (`{"event": "bot_uttered", "data": {...}}`) or a user
//! action (`{"action": "utter", "message": "hi"}`,
//! `{"action": "click", "message_index": 0, "option_index": 1}`).
//! Blank lines and lines starting with `#` are skipped.

use crate::config::ClientConfig;
use crate::message::{Message, QuickReplyAction};
use crate::protocol::{OutboundEvent, TransportEvent, Utterance};
use crate::runtime::{ChatClient, ClientError, Connection, TransportError, TransportSink};
use crate::state_machine::ConnectionState;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("Line {line}: no message at index {index}")]
    NoSuchMessage { line: usize, index: usize },
    #[error("Line {line}: {source}")]
    Client {
        line: usize,
        #[source]
        source: ClientError,
    },
    #[error(transparent)]
    Start(#[from] ClientError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Something the local user does
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UserAction {
    Utter {
        message: Utterance,
    },
    /// Click by position, resolved against the history at that point
    Click {
        message_index: usize,
        option_index: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ScriptStep {
    Inbound(TransportEvent),
    Action(UserAction),
}

/// A step with the script line it came from
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptLine {
    pub line: usize,
    pub step: ScriptStep,
}

pub fn parse_script(input: &str) -> Result<Vec<ScriptLine>, ReplayError> {
    input
        .lines()
        .enumerate()
        .map(|(i, text)| (i + 1, text.trim()))
        .filter(|(_, text)| !text.is_empty() && !text.starts_with('#'))
        .map(|(line, text)| {
            serde_json::from_str(text)
                .map(|step| ScriptLine { line, step })
                .map_err(|source| ReplayError::Parse { line, source })
        })
        .collect()
}

/// In-process connection that records what the client emits
#[derive(Default)]
pub struct ScriptedConnection {
    sink: Mutex<Option<TransportSink>>,
    emitted: Mutex<Vec<OutboundEvent>>,
}

impl ScriptedConnection {
    pub fn new() -> Self {
        Self::default()
    }

    async fn deliver(&self, event: TransportEvent) -> Result<(), TransportError> {
        let sink = self
            .sink
            .lock()
            .map_err(|_| TransportError::Closed)?
            .clone()
            .ok_or(TransportError::Closed)?;
        sink.deliver(event).await
    }

    pub fn emitted(&self) -> Vec<OutboundEvent> {
        self.emitted
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn open(&self, config: &ClientConfig, sink: TransportSink) -> Result<(), TransportError> {
        tracing::debug!(endpoint = %config.endpoint(), "Scripted connection opened");
        let mut slot = self.sink.lock().map_err(|_| TransportError::Closed)?;
        *slot = Some(sink);
        Ok(())
    }

    async fn emit(&self, event: &OutboundEvent) -> Result<(), TransportError> {
        self.emitted
            .lock()
            .map_err(|_| TransportError::Emit {
                event: event.name().to_string(),
                message: "recorder poisoned".to_string(),
            })?
            .push(event.clone());
        Ok(())
    }

    async fn close(&self) {
        if let Ok(mut slot) = self.sink.lock() {
            slot.take();
        }
    }
}

/// What a replay produced
#[derive(Debug)]
pub struct ReplayReport {
    pub outbound: Vec<OutboundEvent>,
    pub history: Vec<Arc<Message>>,
    pub state: ConnectionState,
}

/// Run a script to completion, then shut the client down
pub async fn replay(config: ClientConfig, script: Vec<ScriptLine>) -> Result<ReplayReport, ReplayError> {
    let connection = Arc::new(ScriptedConnection::new());
    let client = ChatClient::start(config, Arc::clone(&connection)).await?;

    let result = run_steps(&client, &connection, script).await;
    let report = ReplayReport {
        outbound: connection.emitted(),
        history: client.history(),
        state: client.state(),
    };
    client.shutdown().await;

    result.map(|()| report)
}

async fn run_steps(
    client: &ChatClient,
    connection: &ScriptedConnection,
    script: Vec<ScriptLine>,
) -> Result<(), ReplayError> {
    for ScriptLine { line, step } in script {
        match step {
            ScriptStep::Inbound(event) => {
                tracing::debug!(line, event = event.name(), "Replaying inbound event");
                connection.deliver(event).await?;
                client
                    .flush()
                    .await
                    .map_err(|source| ReplayError::Client { line, source })?;
            }
            ScriptStep::Action(UserAction::Utter { message }) => {
                client
                    .utter(message)
                    .await
                    .map_err(|source| ReplayError::Client { line, source })?;
            }
            ScriptStep::Action(UserAction::Click {
                message_index,
                option_index,
            }) => {
                let message = client
                    .history()
                    .get(message_index)
                    .cloned()
                    .ok_or(ReplayError::NoSuchMessage {
                        line,
                        index: message_index,
                    })?;
                let outcome = client
                    .click(QuickReplyAction {
                        message_id: message.id,
                        option_index,
                    })
                    .await
                    .map_err(|source| ReplayError::Client { line, source })?;
                tracing::debug!(line, ?outcome, "Replayed click");
            }
        }
    }
    Ok(())
}
