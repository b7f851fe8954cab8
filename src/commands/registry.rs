use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use serde_json::Value;

use crate::error::Result;

/// Executable logic behind a command.
pub trait Invocable: Send + Sync {
    fn invoke(&self, args: &[Value]) -> Result<Value>;
}

impl<F> Invocable for F
where
    F: Fn(&[Value]) -> Result<Value> + Send + Sync,
{
    fn invoke(&self, args: &[Value]) -> Result<Value> {
        self(args)
    }
}

pub struct Command {
    pub id: String,
    pub method: String,
    pub return_type_hint: Option<String>,
    handler: Arc<dyn Invocable>,
}

impl Command {
    pub fn new(id: impl Into<String>, handler: impl Invocable + 'static) -> Self {
        let id = id.into();
        Self {
            method: id.clone(),
            id,
            return_type_hint: None,
            handler: Arc::new(handler),
        }
    }

    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    #[must_use]
    pub fn with_return_type_hint(mut self, hint: impl Into<String>) -> Self {
        self.return_type_hint = Some(hint.into());
        self
    }

    pub fn invoke(&self, args: &[Value]) -> Result<Value> {
        self.handler.invoke(args)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("return_type_hint", &self.return_type_hint)
            .finish_non_exhaustive()
    }
}

/// In-process catalog of named commands.
///
/// An alias is a second key bound to the same `Arc<Command>` as its target at
/// the moment the alias was made. Re-registering the target id later does not
/// move the alias.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: RwLock<HashMap<String, Arc<Command>>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `command.id`.
    pub fn register(&self, command: Command) -> Arc<Command> {
        let command = Arc::new(command);
        let previous = self
            .commands
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(command.id.clone(), Arc::clone(&command));
        if previous.is_some() {
            tracing::debug!("Replaced command {}", command.id);
        }
        command
    }

    /// Bind `new_id` to whatever `old_id` currently resolves to. Does nothing
    /// when `old_id` is unknown.
    pub fn register_alias(&self, old_id: &str, new_id: &str) {
        let mut commands = self.commands.write().unwrap_or_else(PoisonError::into_inner);
        let Some(command) = commands.get(old_id).cloned() else {
            tracing::debug!("Alias {new_id} not created: {old_id} is not registered");
            return;
        };
        commands.insert(new_id.to_string(), command);
    }

    pub fn get(&self, id: &str) -> Option<Arc<Command>> {
        self.commands
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Primary entries only, sorted by id.
    pub fn get_all(&self) -> Vec<Arc<Command>> {
        let mut all: Vec<_> = self
            .commands
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(key, command)| **key == command.id)
            .map(|(_, command)| Arc::clone(command))
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn ids(&self) -> Vec<String> {
        self.get_all().iter().map(|c| c.id.clone()).collect()
    }
}
