//! Wire protocol between the control process and the renderer
//!
//! Both directions carry one JSON document per line: commands flow to the
//! renderer over its stdin, replies to queries flow back over its stdout.
//! Replies come back in the order the queries were enqueued, and each one
//! echoes its query's id so that a query lost on the way cannot shift the
//! replies of the queries after it.

mod command;
mod reply;

pub use command::{query_id_of, Args, Command, Kwargs, Value, HANDSHAKE, QUERY_MARKER};
pub use reply::{RemoteError, RemoteErrorKind, RendererInfo, Reply, Response};

use serde::{de::DeserializeOwned, Serialize};

use crate::Result;

/// Version checked during the handshake; bump on any incompatible wire change
pub const PROTOCOL_VERSION: u32 = 2;

/// Serialize a record as a single newline-terminated JSON line
pub fn encode_line<T: Serialize>(record: &T) -> Result<String> {
    let mut json = serde_json::to_string(record)?;
    json.push('\n');
    Ok(json)
}

/// Parse a single JSON line (trailing whitespace is ignored)
pub fn decode_line<T: DeserializeOwned>(line: &str) -> Result<T> {
    Ok(serde_json::from_str(line.trim_end())?)
}
