//! botchat - client-side session and history manager for event-based chat agents
//!
//! Classifies inbound agent messages, keeps the ordered conversation log,
//! negotiates and resumes sessions, and implements quick reply groups.
//! The duplex transport is supplied by the application through
//! [`runtime::Connection`].

#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod classifier;
pub mod config;
pub mod history;
pub mod message;
pub mod protocol;
pub mod quick_reply;
pub mod replay;
pub mod runtime;
pub mod session;
pub mod state_machine;

pub use config::{ClientConfig, ConfigError};
pub use message::{Message, MessageBody, MessageId, MessageKind, QuickReplyAction, QuickReplyOption};
pub use protocol::{OutboundEvent, TransportEvent, Utterance};
pub use quick_reply::ClickOutcome;
pub use runtime::{ChatClient, ClientError, ClientEvent, ClientView, Connection, TransportSink};
pub use state_machine::ConnectionState;
