//! Error types for turtle-relay

use std::time::Duration;

use thiserror::Error;

use crate::protocol::{RemoteError, RemoteErrorKind};

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Failed to start renderer: {0}")]
    Spawn(String),

    #[error("Renderer handshake failed: {0}")]
    Handshake(String),

    /// The peer end of a queue is gone (renderer exited or was shut down)
    #[error("Queue unavailable: {0}")]
    QueueUnavailable(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Command '{command}' failed: {message}")]
    TargetFailure { command: String, message: String },

    #[error("Query '{command}' timed out after {after:?}")]
    Timeout { command: String, after: Duration },

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Convert an error reported by the renderer for `command` into a local error
    pub fn from_remote(command: &str, remote: RemoteError) -> Self {
        match remote.kind {
            RemoteErrorKind::UnknownCommand => Error::UnknownCommand(command.to_string()),
            RemoteErrorKind::InvalidArgument | RemoteErrorKind::Failed => Error::TargetFailure {
                command: command.to_string(),
                message: remote.message,
            },
        }
    }
}

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;
