use std::collections::HashMap;
use std::sync::Arc;

use super::{CallArgs, RenderTarget, TargetError, TargetResult};
use crate::protocol::{Kwargs, Value};

type Handler<T> = Box<dyn Fn(&mut T, &CallArgs<'_>) -> TargetResult<Option<Value>> + Send + Sync>;

/// Table mapping command names to handlers over some state `T`
pub struct CommandRegistry<T> {
    handlers: HashMap<String, Handler<T>>,
}

impl<T> Default for CommandRegistry<T> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<T> std::fmt::Debug for CommandRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.names())
            .finish()
    }
}

impl<T> CommandRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a raw handler; a later registration under the same name wins
    pub fn register<F>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(&mut T, &CallArgs<'_>) -> TargetResult<Option<Value>> + Send + Sync + 'static,
    {
        if self.handlers.insert(name.to_string(), Box::new(handler)).is_some() {
            tracing::warn!("Command '{}' registered twice, keeping the last handler", name);
        }
        self
    }

    /// Register a mutating command
    pub fn action<F>(self, name: &str, handler: F) -> Self
    where
        F: Fn(&mut T, &CallArgs<'_>) -> TargetResult<()> + Send + Sync + 'static,
    {
        self.register(name, move |state, args| {
            handler(state, args)?;
            Ok(None)
        })
    }

    /// Register a read-only query
    pub fn query<F>(self, name: &str, handler: F) -> Self
    where
        F: Fn(&T, &CallArgs<'_>) -> TargetResult<Value> + Send + Sync + 'static,
    {
        self.register(name, move |state, args| handler(state, args).map(Some))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered command names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn dispatch(
        &self,
        state: &mut T,
        operation: &str,
        args: &[Value],
        kwargs: &Kwargs,
    ) -> TargetResult<Option<Value>> {
        let handler = self
            .handlers
            .get(operation)
            .ok_or_else(|| TargetError::UnknownCommand(operation.to_string()))?;
        handler(state, &CallArgs::new(operation, args, kwargs))
    }
}

/// State paired with the registry that operates on it
#[derive(Debug)]
pub struct Registered<T> {
    state: T,
    registry: Arc<CommandRegistry<T>>,
}

impl<T> Registered<T> {
    pub fn new(state: T, registry: Arc<CommandRegistry<T>>) -> Self {
        Self { state, registry }
    }

    pub fn state(&self) -> &T {
        &self.state
    }

    pub fn registry(&self) -> &CommandRegistry<T> {
        &self.registry
    }
}

impl<T> RenderTarget for Registered<T> {
    fn dispatch(&mut self, operation: &str, args: &[Value], kwargs: &Kwargs) -> TargetResult<Option<Value>> {
        self.registry.dispatch(&mut self.state, operation, args, kwargs)
    }
}
