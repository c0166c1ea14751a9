//! Render target interface
//!
//! The renderer loop only knows a target as `dispatch(name, args, kwargs)`.
//! Concrete targets usually keep plain state and expose it through a
//! [`CommandRegistry`] built once at startup.

mod args;
mod registry;

pub use args::CallArgs;
pub use registry::{CommandRegistry, Registered};

use thiserror::Error;

use crate::protocol::{Kwargs, RemoteError, RemoteErrorKind, Value};

/// Failure raised while applying a command to a render target
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TargetError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Failed(String),
}

impl TargetError {
    /// Wire form sent back for a failed query
    pub fn to_remote(&self) -> RemoteError {
        let kind = match self {
            TargetError::UnknownCommand(_) => RemoteErrorKind::UnknownCommand,
            TargetError::InvalidArgument(_) => RemoteErrorKind::InvalidArgument,
            TargetError::Failed(_) => RemoteErrorKind::Failed,
        };
        RemoteError::new(kind, self.to_string())
    }
}

pub type TargetResult<T> = std::result::Result<T, TargetError>;

/// A stateful object that commands are applied to.
///
/// Mutating operations return `Ok(None)`; queries return `Ok(Some(value))`.
/// The renderer loop discards the value of plain commands.
pub trait RenderTarget {
    fn dispatch(&mut self, operation: &str, args: &[Value], kwargs: &Kwargs) -> TargetResult<Option<Value>>;
}
