//! Mock implementations for testing
//!
//! These mocks enable integration testing without a real transport.

use super::traits::*;
use super::TransportSink;
use crate::config::ClientConfig;
use crate::protocol::{OutboundEvent, TransportEvent, UserUttered};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

// ============================================================================
// Mock Connection
// ============================================================================

/// Mock connection that records emitted events and lets tests play the server
#[derive(Default)]
pub struct MockConnection {
    sink: Mutex<Option<TransportSink>>,
    /// Record of all emitted events
    pub emitted: Mutex<Vec<OutboundEvent>>,
    open_error: Option<TransportError>,
    fail_emits: AtomicBool,
    close_count: AtomicUsize,
}

#[allow(dead_code)]
impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// A connection whose `open` fails
    pub fn failing(message: &str) -> Self {
        Self {
            open_error: Some(TransportError::Connect(message.to_string())),
            ..Self::default()
        }
    }

    /// Make every following emit fail
    pub fn fail_emits(&self) {
        self.fail_emits.store(true, Ordering::SeqCst);
    }

    /// Deliver an event as if the server had sent it
    pub async fn deliver(&self, event: TransportEvent) -> Result<(), TransportError> {
        let sink = self
            .sink
            .lock()
            .unwrap()
            .clone()
            .expect("connection was never opened");
        sink.deliver(event).await
    }

    pub fn recorded_events(&self) -> Vec<OutboundEvent> {
        self.emitted.lock().unwrap().clone()
    }

    pub fn utterances(&self) -> Vec<UserUttered> {
        self.recorded_events()
            .into_iter()
            .filter_map(|e| match e {
                OutboundEvent::UserUttered(u) => Some(u),
                OutboundEvent::SessionRequest(_) => None,
            })
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn open(&self, _config: &ClientConfig, sink: TransportSink) -> Result<(), TransportError> {
        *self.sink.lock().unwrap() = Some(sink);
        match &self.open_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn emit(&self, event: &OutboundEvent) -> Result<(), TransportError> {
        if self.fail_emits.load(Ordering::SeqCst) {
            return Err(TransportError::Emit {
                event: event.name().to_string(),
                message: "mock emit failure".to_string(),
            });
        }
        self.emitted.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn close(&self) {
        self.close_count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Connection whose agent echoes every utterance back.
///
/// Replies are delivered from a spawned task, never from inside `emit`.
#[derive(Default)]
pub struct EchoConnection {
    sink: Mutex<Option<TransportSink>>,
}

#[allow(dead_code)]
impl EchoConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn deliver(&self, event: TransportEvent) -> Result<(), TransportError> {
        let sink = self.sink.lock().unwrap().clone().expect("connection was never opened");
        sink.deliver(event).await
    }
}

#[async_trait]
impl Connection for EchoConnection {
    async fn open(&self, _config: &ClientConfig, sink: TransportSink) -> Result<(), TransportError> {
        *self.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    async fn emit(&self, event: &OutboundEvent) -> Result<(), TransportError> {
        let OutboundEvent::UserUttered(utterance) = event else {
            return Ok(());
        };
        let Some(sink) = self.sink.lock().unwrap().clone() else {
            return Err(TransportError::Closed);
        };
        let reply = serde_json::json!({ "text": utterance.message.display_text() });
        tokio::spawn(async move {
            let _ = sink.deliver(TransportEvent::BotUttered(reply)).await;
        });
        Ok(())
    }

    async fn close(&self) {
        self.sink.lock().unwrap().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryError;
    use crate::message::{Message, MessageId, MessageKind, QuickReplyAction};
    use crate::protocol::{SessionRequest, Utterance};
    use crate::quick_reply::ClickOutcome;
    use crate::runtime::{ChatClient, ClientError, ClientEvent};
    use crate::state_machine::{ConnectionState, TransitionError};
    use serde_json::json;
    use std::sync::Arc;

    fn test_config() -> ClientConfig {
        ClientConfig::new("http://localhost:5005")
    }

    async fn start(config: ClientConfig) -> (ChatClient, Arc<MockConnection>) {
        let connection = Arc::new(MockConnection::new());
        let client = ChatClient::start(config, Arc::clone(&connection))
            .await
            .unwrap();
        (client, connection)
    }

    /// Client that went through connect and `session_confirm("abc")`
    async fn confirmed(config: ClientConfig) -> (ChatClient, Arc<MockConnection>) {
        let (client, connection) = start(config).await;
        connection.deliver(TransportEvent::Connect).await.unwrap();
        connection
            .deliver(TransportEvent::SessionConfirm("abc".to_string()))
            .await
            .unwrap();
        client.flush().await.unwrap();
        (client, connection)
    }

    async fn deliver_quick_reply(client: &ChatClient, connection: &MockConnection) -> MessageId {
        connection
            .deliver(TransportEvent::BotUttered(json!({
                "text": "Shall we continue?",
                "quick_replies": [
                    { "content_type": "text", "title": "Yes", "payload": "/yes" },
                    { "content_type": "text", "title": "No", "payload": "no thanks" }
                ]
            })))
            .await
            .unwrap();
        client.flush().await.unwrap();
        client.history().last().unwrap().id
    }

    #[tokio::test]
    async fn test_starts_connecting() {
        let (client, connection) = start(test_config()).await;
        client.flush().await.unwrap();
        assert_eq!(client.state(), ConnectionState::Connecting);
        assert!(client.history().is_empty());
        assert!(connection.recorded_events().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_invalid_config() {
        let result = ChatClient::start(ClientConfig::new(""), MockConnection::new()).await;
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[tokio::test]
    async fn test_connect_sends_session_request() {
        let (client, connection) = start(test_config()).await;
        connection.deliver(TransportEvent::Connect).await.unwrap();
        client.flush().await.unwrap();

        assert_eq!(client.state(), ConnectionState::Connected);
        assert_eq!(
            connection.recorded_events(),
            vec![OutboundEvent::SessionRequest(SessionRequest { session_id: None })]
        );
    }

    #[tokio::test]
    async fn test_failed_open_lands_in_error() {
        let connection = Arc::new(MockConnection::failing("refused"));
        let client = ChatClient::start(test_config(), Arc::clone(&connection))
            .await
            .unwrap();
        client.flush().await.unwrap();

        assert_eq!(client.state(), ConnectionState::Error);
        assert!(matches!(
            client.utter("hello").await,
            Err(ClientError::Rejected(TransitionError::ConnectionFailed))
        ));
        assert!(client.history().is_empty());
    }

    /// connect -> session_confirm("abc") with send_on_connect "/greet"
    #[tokio::test]
    async fn test_initial_utterance_after_confirmation() {
        let (client, connection) = confirmed(test_config().with_send_on_connect("/greet")).await;

        let utterances = connection.utterances();
        assert_eq!(
            utterances,
            vec![UserUttered {
                session_id: "abc".to_string(),
                message: Utterance::from("/greet"),
            }]
        );
        // The session request went out first
        assert!(matches!(
            connection.recorded_events()[0],
            OutboundEvent::SessionRequest(_)
        ));

        let history = client.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind(), MessageKind::Text);
        assert_eq!(history[0].text(), Some("/greet"));
        assert!(!history[0].received);
        assert_eq!(client.state(), ConnectionState::WaitingForResponse);
    }

    #[tokio::test]
    async fn test_initial_utterance_not_repeated_on_reconnect() {
        let (client, connection) = confirmed(test_config().with_send_on_connect("/greet")).await;

        connection
            .deliver(TransportEvent::Disconnect("ping timeout".to_string()))
            .await
            .unwrap();
        connection.deliver(TransportEvent::Connect).await.unwrap();
        connection
            .deliver(TransportEvent::SessionConfirm("abc".to_string()))
            .await
            .unwrap();
        client.flush().await.unwrap();

        assert_eq!(connection.utterances().len(), 1);
        // Reconnect offered the previous token
        assert_eq!(
            connection.recorded_events().last(),
            Some(&OutboundEvent::SessionRequest(SessionRequest {
                session_id: Some("abc".to_string())
            }))
        );
    }

    #[tokio::test]
    async fn test_utter_appends_and_waits() {
        let (client, connection) = confirmed(test_config()).await;
        let id = client.utter("hello").await.unwrap();

        assert_eq!(client.state(), ConnectionState::WaitingForResponse);
        let history = client.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, id);
        assert_eq!(history[0].text(), Some("hello"));
        assert!(!history[0].received);
        assert_eq!(connection.utterances()[0].session_id, "abc");
    }

    #[tokio::test]
    async fn test_utter_does_not_deduplicate() {
        let (client, connection) = confirmed(test_config()).await;
        client.utter("again").await.unwrap();
        client.utter("again").await.unwrap();
        assert_eq!(client.history().len(), 2);
        assert_eq!(connection.utterances().len(), 2);
    }

    #[tokio::test]
    async fn test_new_token_replaces_old_on_outbound() {
        let (client, connection) = confirmed(test_config()).await;
        client.utter("one").await.unwrap();
        connection
            .deliver(TransportEvent::SessionConfirm("xyz".to_string()))
            .await
            .unwrap();
        client.flush().await.unwrap();
        client.utter("two").await.unwrap();

        let ids: Vec<_> = connection
            .utterances()
            .into_iter()
            .map(|u| u.session_id)
            .collect();
        assert_eq!(ids, vec!["abc".to_string(), "xyz".to_string()]);
        assert_eq!(client.session_id().as_deref(), Some("xyz"));
    }

    #[tokio::test]
    async fn test_bot_message_returns_to_connected() {
        let (client, connection) = confirmed(test_config()).await;
        client.utter("hi").await.unwrap();
        connection
            .deliver(TransportEvent::BotUttered(json!({
                "attachment": { "type": "image", "payload": { "src": "https://x/cat.png" } },
                "text": "a cat"
            })))
            .await
            .unwrap();
        client.flush().await.unwrap();

        assert_eq!(client.state(), ConnectionState::Connected);
        let history = client.history();
        assert_eq!(history.len(), 2);
        assert!(history[1].received);
        assert_eq!(history[1].kind(), MessageKind::Attachment);
    }

    #[tokio::test]
    async fn test_quick_reply_command_keeps_message() {
        let (client, connection) = confirmed(test_config()).await;
        let id = deliver_quick_reply(&client, &connection).await;

        let outcome = client
            .click(QuickReplyAction {
                message_id: id,
                option_index: 0,
            })
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ClickOutcome::Retained {
                payload: "/yes".to_string()
            }
        );

        let history = client.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, id);
        assert!(history[0].is_resolved());
        assert!(history[0].quick_replies()[0].clicked);
        assert!(!history[0].quick_replies()[1].clicked);
        assert_eq!(history[1].text(), Some("/yes"));
        assert_eq!(connection.utterances()[0].message, Utterance::from("/yes"));
        assert_eq!(client.state(), ConnectionState::WaitingForResponse);
    }

    #[tokio::test]
    async fn test_quick_reply_free_text_removes_message() {
        let (client, connection) = confirmed(test_config()).await;
        let id = deliver_quick_reply(&client, &connection).await;

        let outcome = client
            .click(QuickReplyAction {
                message_id: id,
                option_index: 1,
            })
            .await
            .unwrap();
        assert!(matches!(outcome, ClickOutcome::Removed { .. }));

        let history = client.history();
        assert!(history.iter().all(|m| m.id != id));
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text(), Some("no thanks"));
        assert_eq!(
            connection.utterances()[0].message,
            Utterance::from("no thanks")
        );
    }

    #[tokio::test]
    async fn test_second_click_is_ignored() {
        let (client, connection) = confirmed(test_config()).await;
        let id = deliver_quick_reply(&client, &connection).await;
        let action = |option_index| QuickReplyAction {
            message_id: id,
            option_index,
        };

        client.click(action(0)).await.unwrap();
        let second = client.click(action(1)).await.unwrap();

        assert_eq!(second, ClickOutcome::Ignored);
        assert_eq!(connection.utterances().len(), 1);
        assert!(client.history()[0].quick_replies()[0].clicked);
    }

    #[tokio::test]
    async fn test_click_on_unknown_message_fails_loudly() {
        let (client, connection) = confirmed(test_config()).await;
        let mut events = client.subscribe();
        let missing = MessageId::new();

        let result = client
            .click(QuickReplyAction {
                message_id: missing,
                option_index: 0,
            })
            .await;

        assert!(matches!(
            result,
            Err(ClientError::Protocol(HistoryError::NotFound(id))) if id == missing
        ));
        assert!(connection.utterances().is_empty());
        assert!(matches!(
            events.recv().await.unwrap(),
            ClientEvent::Fault { .. }
        ));
    }

    #[tokio::test]
    async fn test_disconnect_while_waiting_keeps_history() {
        let (client, connection) = confirmed(test_config()).await;
        client.utter("are you there?").await.unwrap();
        let before: Vec<_> = client.history().iter().map(|m| m.id).collect();

        connection
            .deliver(TransportEvent::Disconnect("transport close".to_string()))
            .await
            .unwrap();
        client.flush().await.unwrap();

        assert_eq!(client.state(), ConnectionState::Disconnected);
        let after: Vec<_> = client.history().iter().map(|m| m.id).collect();
        assert_eq!(before, after);
        assert_eq!(client.session_id().as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_transport_error_keeps_session() {
        let (client, connection) = confirmed(test_config()).await;
        connection
            .deliver(TransportEvent::Error("ECONNRESET".to_string()))
            .await
            .unwrap();
        client.flush().await.unwrap();

        assert_eq!(client.state(), ConnectionState::Error);
        let view = client.watch().borrow().clone();
        assert_eq!(view.last_error.as_deref(), Some("ECONNRESET"));
        assert_eq!(view.session_id.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_emit_failure_does_not_change_state() {
        let (client, connection) = confirmed(test_config()).await;
        connection.fail_emits();
        client.utter("lost").await.unwrap();

        assert_eq!(client.state(), ConnectionState::WaitingForResponse);
        assert_eq!(client.history().len(), 1);
    }

    #[tokio::test]
    async fn test_replace_history_escape_hatch() {
        let (client, _connection) = confirmed(test_config()).await;
        client.utter("old").await.unwrap();
        client
            .replace_history(vec![Message::user_text(MessageId::new(), "restored")])
            .await
            .unwrap();

        let history = client.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text(), Some("restored"));
    }

    #[tokio::test]
    async fn test_change_feed_reports_appends() {
        let (client, connection) = confirmed(test_config()).await;
        let mut events = client.subscribe();
        connection
            .deliver(TransportEvent::BotUttered(json!({ "text": "hello" })))
            .await
            .unwrap();
        client.flush().await.unwrap();

        match events.recv().await.unwrap() {
            ClientEvent::MessageAppended(message) => assert_eq!(message.text(), Some("hello")),
            other => panic!("Expected append, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_shutdown_closes_connection_and_ignores_late_events() {
        let (client, connection) = confirmed(test_config()).await;
        let view = client.watch();
        client.shutdown().await;

        assert_eq!(connection.close_count(), 1);
        assert_eq!(view.borrow().state, ConnectionState::Disconnected);
        assert_eq!(view.borrow().session_id, None);
        assert_eq!(
            connection
                .deliver(TransportEvent::BotUttered(json!({ "text": "too late" })))
                .await,
            Err(TransportError::Closed)
        );
        assert!(view.borrow().history.is_empty());
    }

    #[tokio::test]
    async fn test_replies_delivered_off_emit_do_not_stall_a_full_queue() {
        let connection = Arc::new(EchoConnection::new());
        let client = ChatClient::start(test_config().with_queue_capacity(1), Arc::clone(&connection))
            .await
            .unwrap();
        connection.deliver(TransportEvent::Connect).await.unwrap();

        for i in 0..5 {
            client.utter(format!("ping {i}")).await.unwrap();
        }

        let mut view = client.watch();
        tokio::time::timeout(
            std::time::Duration::from_secs(1),
            view.wait_for(|v| v.history.len() == 10),
        )
        .await
        .unwrap()
        .unwrap();

        let received = client.history().iter().filter(|m| m.received).count();
        assert_eq!(received, 5);
        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_dropping_client_closes_connection() {
        let (client, connection) = confirmed(test_config()).await;
        let mut view = client.watch();
        view.borrow_and_update();
        drop(client);

        // Teardown closes the connection, then publishes once more
        tokio::time::timeout(std::time::Duration::from_secs(1), view.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(connection.close_count(), 1);
    }
}
