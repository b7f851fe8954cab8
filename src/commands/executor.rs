use std::{
    panic::{self, AssertUnwindSafe},
    sync::{Arc, PoisonError, RwLock},
};

use async_trait::async_trait;
use serde_json::Value;

use super::{Command, CommandRegistry};
use crate::{
    bus::UiDispatcher,
    error::{panic_message, Error, Result},
    rpc::{arg, methods, ExtHostCommands, RpcService},
};

/// Runs commands by id, wherever their handler lives.
pub struct CommandExecutor {
    registry: Arc<CommandRegistry>,
    ui: Option<UiDispatcher>,
    remote: RwLock<Option<ExtHostCommands>>,
}

impl CommandExecutor {
    pub const fn new(registry: Arc<CommandRegistry>, ui: Option<UiDispatcher>) -> Self {
        Self {
            registry,
            ui,
            remote: RwLock::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    /// Forward unknown commands to the extension host from now on.
    pub fn attach_remote(&self, remote: ExtHostCommands) {
        *self.remote.write().unwrap_or_else(PoisonError::into_inner) = Some(remote);
    }

    pub fn detach_remote(&self) {
        self.remote
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Run `id` locally if registered here, otherwise on the extension host.
    pub async fn execute(&self, id: &str, args: Vec<Value>) -> Result<Value> {
        if let Some(command) = self.registry.get(id) {
            return self.run(command, args).await;
        }
        let remote = self
            .remote
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match remote {
            Some(remote) => remote.execute_contributed_command(id, args).await,
            None => Err(Error::UnknownCommand(id.to_string())),
        }
    }

    /// Run `id` only if it is registered here.
    pub async fn execute_local(&self, id: &str, args: Vec<Value>) -> Result<Value> {
        let command = self
            .registry
            .get(id)
            .ok_or_else(|| Error::UnknownCommand(id.to_string()))?;
        self.run(command, args).await
    }

    /// Entry point for user actions: a failure is logged, never raised.
    pub async fn execute_or_log(&self, id: &str, args: Vec<Value>) -> Option<Value> {
        match self.execute(id, args).await {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Command {id} failed: {e}");
                None
            }
        }
    }

    async fn run(&self, command: Arc<Command>, args: Vec<Value>) -> Result<Value> {
        tracing::debug!("Running command {} ({})", command.id, command.method);
        match &self.ui {
            Some(ui) => ui.run(move || command.invoke(&args)).await?,
            None => panic::catch_unwind(AssertUnwindSafe(|| command.invoke(&args))).unwrap_or_else(
                |panic| {
                    Err(Error::Internal(format!(
                        "Command {} panicked: {}",
                        command.id,
                        panic_message(panic.as_ref())
                    )))
                },
            ),
        }
    }
}

/// Serves a commands identifier from the local registry. Both sides use it,
/// under their own method names.
pub struct CommandsService {
    executor: Arc<CommandExecutor>,
    execute_method: &'static str,
    list_method: &'static str,
    target: &'static str,
}

impl CommandsService {
    /// `MainThreadCommands` on the host.
    pub const fn main_thread(executor: Arc<CommandExecutor>) -> Self {
        Self {
            executor,
            execute_method: methods::EXECUTE_COMMAND,
            list_method: methods::GET_COMMANDS,
            target: "MainThreadCommands",
        }
    }

    /// `ExtHostCommands` on the extension host.
    pub const fn ext_host(executor: Arc<CommandExecutor>) -> Self {
        Self {
            executor,
            execute_method: methods::EXECUTE_CONTRIBUTED_COMMAND,
            list_method: methods::GET_CONTRIBUTED_COMMANDS,
            target: "ExtHostCommands",
        }
    }
}

#[async_trait]
impl RpcService for CommandsService {
    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        if method == self.execute_method {
            let id: String = arg(method, &args, 0)?;
            let command_args: Option<Vec<Value>> = arg(method, &args, 1)?;
            self.executor
                .execute_local(&id, command_args.unwrap_or_default())
                .await
        } else if method == self.list_method {
            Ok(Value::from(self.executor.registry().ids()))
        } else {
            Err(Error::UnknownMethod {
                target: self.target.to_string(),
                method: method.to_string(),
            })
        }
    }
}
