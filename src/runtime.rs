//! Runtime for a chat client session
//!
//! One spawned task owns the connection state, the session and the history.
//! Transport events, utterances and clicks all travel through a single queue
//! and are handled one at a time, so no two mutations ever interleave.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub(crate) use executor::ClientRuntime;
pub use traits::*;

use crate::config::{ClientConfig, ConfigError};
use crate::history::HistoryError;
use crate::message::{Message, MessageId, QuickReplyAction};
use crate::protocol::{TransportEvent, Utterance};
use crate::quick_reply::ClickOutcome;
use crate::state_machine::{ClientContext, ConnectionState, TransitionError};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const EVENT_CHANNEL_CAPACITY: usize = 128;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Client has shut down")]
    Closed,
    #[error("Rejected: {0}")]
    Rejected(#[from] TransitionError),
    /// The caller and the history disagree; treat as a bug, not a retry case
    #[error("Protocol violation: {0}")]
    Protocol(#[from] HistoryError),
}

/// Work items for the dispatch loop
pub(crate) enum Dispatch {
    Transport(TransportEvent),
    Utter {
        message: Utterance,
        reply: oneshot::Sender<Result<MessageId, ClientError>>,
    },
    Click {
        action: QuickReplyAction,
        reply: oneshot::Sender<Result<ClickOutcome, ClientError>>,
    },
    ReplaceHistory {
        messages: Vec<Message>,
        reply: oneshot::Sender<()>,
    },
    Flush {
        reply: oneshot::Sender<()>,
    },
}

/// Handle given to the transport for delivering inbound events
#[derive(Clone)]
pub struct TransportSink {
    tx: mpsc::Sender<Dispatch>,
}

impl TransportSink {
    /// Queue an event. Fails once the client has shut down; the event is
    /// then dropped.
    pub async fn deliver(&self, event: TransportEvent) -> Result<(), TransportError> {
        self.tx
            .send(Dispatch::Transport(event))
            .await
            .map_err(|_| TransportError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Read-only snapshot published after every handled dispatch
#[derive(Debug, Clone, Default)]
pub struct ClientView {
    pub state: ConnectionState,
    pub session_id: Option<String>,
    pub last_error: Option<String>,
    pub history: Vec<Arc<Message>>,
}

/// Change notifications for renderers
#[derive(Debug, Clone)]
pub enum ClientEvent {
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    MessageAppended(Arc<Message>),
    MessageUpdated(Arc<Message>),
    MessageRemoved(MessageId),
    HistoryReplaced,
    Fault {
        message: String,
    },
}

/// Application-facing client handle.
///
/// Dropping the handle tears the session down and closes the connection.
pub struct ChatClient {
    dispatch_tx: mpsc::Sender<Dispatch>,
    view_rx: watch::Receiver<ClientView>,
    events_tx: broadcast::Sender<ClientEvent>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ChatClient {
    /// Spawn the dispatch loop and open the connection
    pub async fn start<C>(config: ClientConfig, connection: C) -> Result<Self, ClientError>
    where
        C: Connection + 'static,
    {
        config.validate()?;

        let (dispatch_tx, dispatch_rx) = mpsc::channel(config.queue_capacity);
        let (view_tx, view_rx) = watch::channel(ClientView::default());
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let connection = Arc::new(connection);

        let runtime = ClientRuntime::new(
            ClientContext::from(&config),
            Arc::clone(&connection),
            dispatch_rx,
            cancel.clone(),
            view_tx,
            events_tx.clone(),
        );
        let task = tokio::spawn(runtime.run());

        let sink = TransportSink {
            tx: dispatch_tx.clone(),
        };
        tracing::info!(endpoint = %config.endpoint(), "Opening connection");
        if let Err(e) = connection.open(&config, sink.clone()).await {
            tracing::warn!(error = %e, "Failed to open connection");
            let _ = sink.deliver(TransportEvent::Error(e.to_string())).await;
        }

        Ok(Self {
            dispatch_tx,
            view_rx,
            events_tx,
            cancel,
            task: Some(task),
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.view_rx.borrow().state
    }

    pub fn session_id(&self) -> Option<String> {
        self.view_rx.borrow().session_id.clone()
    }

    pub fn history(&self) -> Vec<Arc<Message>> {
        self.view_rx.borrow().history.clone()
    }

    /// Current snapshot plus change notification
    pub fn watch(&self) -> watch::Receiver<ClientView> {
        self.view_rx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events_tx.subscribe()
    }

    /// Send a message as the local user. Returns the id of the new log entry.
    pub async fn utter(&self, message: impl Into<Utterance>) -> Result<MessageId, ClientError> {
        let message = message.into();
        self.request(|reply| Dispatch::Utter { message, reply }).await?
    }

    /// Click a quick reply option
    pub async fn click(&self, action: QuickReplyAction) -> Result<ClickOutcome, ClientError> {
        self.request(|reply| Dispatch::Click { action, reply }).await?
    }

    /// Replace the whole history. No invariant is checked.
    pub async fn replace_history(&self, messages: Vec<Message>) -> Result<(), ClientError> {
        self.request(|reply| Dispatch::ReplaceHistory { messages, reply }).await
    }

    /// Wait until everything queued before this call has been handled
    pub async fn flush(&self) -> Result<(), ClientError> {
        self.request(|reply| Dispatch::Flush { reply }).await
    }

    /// Tear down the session and wait for the connection to close
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Client runtime panicked");
            }
        }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Dispatch,
    ) -> Result<T, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.dispatch_tx
            .send(make(reply))
            .await
            .map_err(|_| ClientError::Closed)?;
        rx.await.map_err(|_| ClientError::Closed)
    }
}

impl Drop for ChatClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
