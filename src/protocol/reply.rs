//! Reply records sent from the renderer back to the control process

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Value;
use crate::{Error, Result};

/// A reply on the wire, tagged with the id of the query it answers.
///
/// Serialized flat, e.g. `{"id":3,"ok":[10.0,20.0]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(flatten)]
    pub reply: Reply,
}

impl Response {
    pub fn new(id: Option<u64>, reply: Reply) -> Self {
        Self { id, reply }
    }
}

/// Outcome of a single query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Reply {
    Ok(Value),
    Error(RemoteError),
}

impl Reply {
    /// Turn the reply into a local result for the query named `command`
    pub fn into_result(self, command: &str) -> Result<Value> {
        match self {
            Reply::Ok(value) => Ok(value),
            Reply::Error(remote) => Err(Error::from_remote(command, remote)),
        }
    }
}

/// Failure reported by the renderer for a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RemoteErrorKind {
    UnknownCommand,
    InvalidArgument,
    Failed,
}

/// Handshake payload describing a running renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RendererInfo {
    pub protocol: u32,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
}
