//! Command records sent from the control process to the renderer

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Any serializable argument or result value
pub type Value = serde_json::Value;

/// Positional arguments
pub type Args = Vec<Value>;

/// Keyword arguments
pub type Kwargs = serde_json::Map<String, Value>;

/// Leading sigil on a command name marking it as a query that expects a reply
pub const QUERY_MARKER: char = '*';

/// Reserved query answered by the renderer loop itself
pub const HANDSHAKE: &str = "__handshake__";

/// A named instruction destined for the render target.
///
/// Immutable once built; the query marker, if any, is part of `name`. Queries
/// sent through a proxy also carry an `id`, echoed back in their reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<u64>,

    name: String,

    #[serde(default)]
    args: Args,

    #[serde(default, skip_serializing_if = "Kwargs::is_empty")]
    kwargs: Kwargs,
}

impl Command {
    /// Build a fire-and-forget command
    pub fn plain(name: impl Into<String>, args: Args, kwargs: Kwargs) -> Result<Self> {
        let name = name.into();
        validate_operation(&name)?;
        Ok(Self {
            id: None,
            name,
            args,
            kwargs,
        })
    }

    /// Build a query command; the marker is added here and must not be supplied
    pub fn query(name: impl Into<String>, args: Args, kwargs: Kwargs) -> Result<Self> {
        let name = name.into();
        validate_operation(&name)?;
        Ok(Self {
            id: None,
            name: format!("{QUERY_MARKER}{name}"),
            args,
            kwargs,
        })
    }

    /// Tag a query with the id its reply will carry
    pub fn with_id(self, id: u64) -> Self {
        Self { id: Some(id), ..self }
    }

    pub fn id(&self) -> Option<u64> {
        self.id
    }

    /// Full wire name, including the query marker
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Operation name with the query marker stripped
    pub fn operation(&self) -> &str {
        self.name.strip_prefix(QUERY_MARKER).unwrap_or(&self.name)
    }

    pub fn is_query(&self) -> bool {
        self.name.starts_with(QUERY_MARKER)
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn kwargs(&self) -> &Kwargs {
        &self.kwargs
    }
}

/// The parts of a command line needed to answer it
#[derive(Deserialize)]
struct CommandHeader {
    #[serde(default)]
    id: Option<u64>,
    name: String,
}

/// Id of the query on a line that did not decode as a [`Command`].
///
/// Returns `None` for plain commands and for lines too broken to tell.
/// Unknown fields are skipped without being built, so a line rejected for
/// its arguments usually still yields its id.
pub fn query_id_of(line: &str) -> Option<u64> {
    let header: CommandHeader = serde_json::from_str(line.trim_end()).ok()?;
    if header.name.starts_with(QUERY_MARKER) {
        header.id
    } else {
        None
    }
}

fn validate_operation(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidCommand("command name is empty".to_string()));
    }
    if name.starts_with(QUERY_MARKER) {
        return Err(Error::InvalidCommand(format!(
            "'{name}' starts with the reserved query marker '{QUERY_MARKER}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_command() {
        let cmd = Command::plain("forward", vec![json!(5)], Kwargs::new()).unwrap();
        assert_eq!(cmd.name(), "forward");
        assert_eq!(cmd.operation(), "forward");
        assert!(!cmd.is_query());
        assert_eq!(cmd.args(), &[json!(5)]);
    }

    #[test]
    fn test_query_command_is_marked() {
        let cmd = Command::query("getpos", vec![], Kwargs::new()).unwrap();
        assert_eq!(cmd.name(), "*getpos");
        assert_eq!(cmd.operation(), "getpos");
        assert!(cmd.is_query());
    }

    #[test]
    fn test_query_id_survives_bad_arguments() {
        assert_eq!(query_id_of(r#"{"id":7,"name":"*getpos","kwargs":5}"#), Some(7));
        assert_eq!(query_id_of(r#"{"name":"*getpos","args":"x"}"#), None);
        assert_eq!(query_id_of(r#"{"id":7,"name":"forward","kwargs":5}"#), None);
        assert_eq!(query_id_of("not json"), None);
    }

    #[test]
    fn test_with_id() {
        let cmd = Command::query("getpos", vec![], Kwargs::new()).unwrap();
        assert_eq!(cmd.id(), None);
        assert_eq!(cmd.with_id(3).id(), Some(3));
    }

    #[test]
    fn test_rejects_empty_and_marked_names() {
        assert!(matches!(
            Command::plain("", vec![], Kwargs::new()),
            Err(Error::InvalidCommand(_))
        ));
        assert!(matches!(
            Command::plain("  ", vec![], Kwargs::new()),
            Err(Error::InvalidCommand(_))
        ));
        assert!(matches!(
            Command::plain("*getpos", vec![], Kwargs::new()),
            Err(Error::InvalidCommand(_))
        ));
        assert!(matches!(
            Command::query("*getpos", vec![], Kwargs::new()),
            Err(Error::InvalidCommand(_))
        ));
    }
}
