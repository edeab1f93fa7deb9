//! Client runtime executor

use super::traits::Connection;
use super::{ClientError, ClientEvent, ClientView, Dispatch};

use crate::history::HistoryStore;
use crate::message::{MessageId, QuickReplyAction};
use crate::quick_reply::{resolve_click, ClickOutcome};
use crate::state_machine::{transition, ClientContext, ClientState, Effect, Event};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Single-task owner of the client state, the session and the history
pub struct ClientRuntime<C>
where
    C: Connection + 'static,
{
    context: ClientContext,
    state: ClientState,
    history: HistoryStore,
    connection: Arc<C>,
    dispatch_rx: mpsc::Receiver<Dispatch>,
    cancel: CancellationToken,
    view_tx: watch::Sender<ClientView>,
    events_tx: broadcast::Sender<ClientEvent>,
    /// Outcome of the click being processed, handed back to the caller
    click_outcome: Option<ClickOutcome>,
}

impl<C> ClientRuntime<C>
where
    C: Connection + 'static,
{
    pub(crate) fn new(
        context: ClientContext,
        connection: Arc<C>,
        dispatch_rx: mpsc::Receiver<Dispatch>,
        cancel: CancellationToken,
        view_tx: watch::Sender<ClientView>,
        events_tx: broadcast::Sender<ClientEvent>,
    ) -> Self {
        Self {
            context,
            state: ClientState::default(),
            history: HistoryStore::new(),
            connection,
            dispatch_rx,
            cancel,
            view_tx,
            events_tx,
            click_outcome: None,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("Starting chat client runtime");

        // Process dispatches in a loop - one at a time, to completion
        loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    tracing::debug!("Shutdown requested");
                    break;
                }

                dispatch = self.dispatch_rx.recv() => match dispatch {
                    Some(dispatch) => self.handle_dispatch(dispatch).await,
                    None => break,
                },
            }
        }

        self.teardown().await;
        tracing::info!("Chat client runtime stopped");
    }

    async fn handle_dispatch(&mut self, dispatch: Dispatch) {
        match dispatch {
            Dispatch::Transport(event) => {
                let name = event.name();
                if let Err(e) = self.process_event(Event::from(event)).await {
                    tracing::warn!(event = name, error = %e, "Dropped transport event");
                }
                self.publish();
            }

            Dispatch::Utter { message, reply } => {
                let message_id = MessageId::new();
                let result = self
                    .process_event(Event::UserUttered {
                        message_id,
                        message,
                    })
                    .await
                    .map(|()| message_id);
                self.publish();
                let _ = reply.send(result);
            }

            Dispatch::Click { action, reply } => {
                let result = self.process_click(action).await;
                self.publish();
                let _ = reply.send(result);
            }

            Dispatch::ReplaceHistory { messages, reply } => {
                tracing::debug!(count = messages.len(), "Replacing history");
                self.history.replace(messages);
                let _ = self.events_tx.send(ClientEvent::HistoryReplaced);
                self.publish();
                let _ = reply.send(());
            }

            Dispatch::Flush { reply } => {
                let _ = reply.send(());
            }
        }
    }

    async fn process_click(&mut self, action: QuickReplyAction) -> Result<ClickOutcome, ClientError> {
        self.click_outcome = None;
        match self.process_event(Event::QuickReplyClicked { action }).await {
            Ok(()) => Ok(self.click_outcome.take().unwrap_or(ClickOutcome::Ignored)),
            Err(e) => {
                if matches!(e, ClientError::Protocol(_)) {
                    tracing::error!(
                        message_id = %action.message_id,
                        option_index = action.option_index,
                        error = %e,
                        "Quick reply click does not match history"
                    );
                    let _ = self.events_tx.send(ClientEvent::Fault {
                        message: e.to_string(),
                    });
                }
                Err(e)
            }
        }
    }

    /// Run an event through the state machine, along with any events its
    /// effects generate. Everything happens before the next dispatch.
    async fn process_event(&mut self, event: Event) -> Result<(), ClientError> {
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            // Pure state transition
            let result = transition(&self.state, &self.context, current_event)?;

            // Update state
            let old_state = std::mem::replace(&mut self.state, result.new_state);
            if old_state.connection != self.state.connection {
                tracing::info!(
                    from = %old_state.connection,
                    to = %self.state.connection,
                    "Connection state changed"
                );
                let _ = self.events_tx.send(ClientEvent::StateChanged {
                    from: old_state.connection,
                    to: self.state.connection,
                });
            }

            // Execute effects and collect generated events
            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(effect).await? {
                    events_to_process.push(generated_event);
                }
            }
        }

        Ok(())
    }

    /// Execute an effect and optionally return a generated event
    async fn execute_effect(&mut self, effect: Effect) -> Result<Option<Event>, ClientError> {
        match effect {
            Effect::Emit(event) => {
                // Fire-and-forget: a failed emit is the transport's problem
                if let Err(e) = self.connection.emit(&event).await {
                    tracing::warn!(event = event.name(), error = %e, "Emit failed");
                } else {
                    tracing::debug!(event = event.name(), "Emitted");
                }
                Ok(None)
            }

            Effect::AppendMessage { message } => {
                tracing::debug!(
                    message_id = %message.id,
                    kind = ?message.kind(),
                    received = message.received,
                    "Appending message"
                );
                let message = self.history.append(message);
                let _ = self.events_tx.send(ClientEvent::MessageAppended(message));
                Ok(None)
            }

            Effect::SendInitialUtterance { message } => {
                tracing::info!(%message, "Sending initial utterance");
                Ok(Some(Event::UserUttered {
                    message_id: MessageId::new(),
                    message,
                }))
            }

            Effect::ResolveQuickReply { action } => {
                let outcome = resolve_click(&mut self.history, action)?;
                match &outcome {
                    ClickOutcome::Retained { .. } => {
                        if let Some(message) = self.history.find_by_id(action.message_id) {
                            let _ = self
                                .events_tx
                                .send(ClientEvent::MessageUpdated(Arc::clone(message)));
                        }
                    }
                    ClickOutcome::Removed { .. } => {
                        let _ = self
                            .events_tx
                            .send(ClientEvent::MessageRemoved(action.message_id));
                    }
                    ClickOutcome::Ignored => {}
                }

                let next = outcome.payload().map(|payload| Event::UserUttered {
                    message_id: MessageId::new(),
                    message: payload.into(),
                });
                self.click_outcome = Some(outcome);
                Ok(next)
            }

            Effect::CloseConnection => {
                tracing::info!("Closing connection");
                self.connection.close().await;
                Ok(None)
            }

            Effect::PublishState => {
                self.publish();
                Ok(None)
            }
        }
    }

    fn publish(&self) {
        self.view_tx.send_replace(ClientView {
            state: self.state.connection,
            session_id: self.state.session.token.clone(),
            last_error: self.state.last_error.clone(),
            history: self.history.snapshot(),
        });
    }

    /// Release everything. Runs on every exit path of the dispatch loop.
    async fn teardown(&mut self) {
        // Anything still queued is discarded
        self.dispatch_rx.close();

        if let Err(e) = self.process_event(Event::Shutdown).await {
            tracing::error!(error = %e, "Shutdown transition failed, closing connection directly");
            self.connection.close().await;
        }
    }
}
