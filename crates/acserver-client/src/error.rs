//! Error types for the server plugin client.

use openracing_acserver_protocol::CodecError;
use thiserror::Error;

/// Errors surfaced to the process that owns a [`crate::SessionClient`].
///
/// Only [`ClientError::ProtocolVersionMismatch`] ends a connection; transport
/// and decode failures inside the receive loop are logged and absorbed.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server speaks a different protocol version. Fatal.
    #[error("Protocol version mismatch: expected {expected}, server sent {received}")]
    ProtocolVersionMismatch {
        /// Version this client implements.
        expected: u8,
        /// Version announced by the server.
        received: u8,
    },

    /// Plugins, sinks and relays can only be registered while disconnected.
    #[error("Registration is only allowed while disconnected")]
    RegistrationWhileConnected,

    #[error("Client is already connected")]
    AlreadyConnected,

    /// The outbound queue has already been taken by another transport.
    #[error("A transport is already attached to this client")]
    TransportAttached,

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ClientError {
    #[must_use]
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration(reason.into())
    }

    #[must_use]
    pub fn version_mismatch(expected: u8, received: u8) -> Self {
        Self::ProtocolVersionMismatch { expected, received }
    }

    /// Whether this error ends the connection.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ProtocolVersionMismatch { .. })
    }

    /// Whether this error comes from loading or validating configuration.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfiguration(_) | Self::Json(_) | Self::Yaml(_)
        )
    }
}

/// Result alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
