//! Client configuration

use crate::protocol::Utterance;
use thiserror::Error;

pub const DEFAULT_SOCKET_PATH: &str = "/socket.io";
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Server URL is required (set BOTCHAT_SERVER_URL)")]
    MissingServerUrl,
    #[error("Socket path must start with '/': {0}")]
    InvalidSocketPath(String),
    #[error("Queue capacity must be at least 1")]
    ZeroQueueCapacity,
}

/// Settings accepted by the client at construction
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub server_url: String,
    pub socket_path: String,
    /// Uttered right after the first session confirmation
    pub send_on_connect: Option<Utterance>,
    /// Bound of the dispatch queue
    pub queue_capacity: usize,
}

impl ClientConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            socket_path: DEFAULT_SOCKET_PATH.to_string(),
            send_on_connect: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Read settings from `BOTCHAT_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with_default("")
    }

    /// Like [`ClientConfig::from_env`], falling back to `server_url` when
    /// `BOTCHAT_SERVER_URL` is unset
    pub fn from_env_with_default(server_url: &str) -> Result<Self, ConfigError> {
        let server_url =
            std::env::var("BOTCHAT_SERVER_URL").unwrap_or_else(|_| server_url.to_string());
        let mut config = Self::new(server_url);
        if let Ok(path) = std::env::var("BOTCHAT_SOCKET_PATH") {
            config.socket_path = path;
        }
        config.send_on_connect = std::env::var("BOTCHAT_SEND_ON_CONNECT")
            .ok()
            .filter(|s| !s.is_empty())
            .map(Utterance::from);
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_socket_path(mut self, path: impl Into<String>) -> Self {
        self.socket_path = path.into();
        self
    }

    #[must_use]
    pub fn with_send_on_connect(mut self, utterance: impl Into<Utterance>) -> Self {
        self.send_on_connect = Some(utterance.into());
        self
    }

    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_url.trim().is_empty() {
            return Err(ConfigError::MissingServerUrl);
        }
        if !self.socket_path.starts_with('/') {
            return Err(ConfigError::InvalidSocketPath(self.socket_path.clone()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        Ok(())
    }

    /// Full endpoint the transport should dial
    pub fn endpoint(&self) -> String {
        format!(
            "{}{}",
            self.server_url.trim_end_matches('/'),
            self.socket_path
        )
    }
}
