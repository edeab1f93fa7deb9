//! Trait abstractions for runtime I/O
//!
//! The transport is an external collaborator. These traits let the runtime
//! drive any duplex connection, and let tests substitute a mock.

use super::TransportSink;
use crate::config::ClientConfig;
use crate::protocol::OutboundEvent;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Connection closed")]
    Closed,
    #[error("Failed to connect: {0}")]
    Connect(String),
    #[error("Failed to emit {event}: {message}")]
    Emit { event: String, message: String },
}

/// A persistent duplex connection to the agent
#[async_trait]
pub trait Connection: Send + Sync {
    /// Start connecting. Lifecycle and inbound events are delivered
    /// through `sink` for as long as the connection lives.
    async fn open(&self, config: &ClientConfig, sink: TransportSink) -> Result<(), TransportError>;

    /// Send an event. Does not wait for an acknowledgement.
    ///
    /// The runtime awaits this call from the dispatch loop, so it must not
    /// await [`TransportSink::deliver`]: once the bounded queue is full that
    /// deadlocks. Hand inbound events to a separate task instead.
    async fn emit(&self, event: &OutboundEvent) -> Result<(), TransportError>;

    /// Release the connection. Called exactly once, on teardown.
    async fn close(&self);
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: Connection + ?Sized> Connection for Arc<T> {
    async fn open(&self, config: &ClientConfig, sink: TransportSink) -> Result<(), TransportError> {
        (**self).open(config, sink).await
    }

    async fn emit(&self, event: &OutboundEvent) -> Result<(), TransportError> {
        (**self).emit(event).await
    }

    async fn close(&self) {
        (**self).close().await;
    }
}
