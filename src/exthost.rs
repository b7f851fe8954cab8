//! Extension-host side endpoint: connects to the host and serves the
//! extension-side identifiers.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::{net::UnixStream, time::sleep};

use crate::{
    commands::{builtin, Command, CommandExecutor, CommandRegistry, CommandsService},
    config::BridgeConfig,
    error::{Error, Result},
    rpc::{
        arg, ext_host, methods, IdentifierRegistry, MainThreadCommands, RpcEngine, RpcService,
        Side,
    },
    workspace::{EditorTab, FileEventsPayload, WorkspaceData},
};

pub const ECHO: &str = "exthost.echo";

pub async fn run(config: BridgeConfig) -> Result<()> {
    let commands = Arc::new(CommandRegistry::new());
    commands.register(
        Command::new(ECHO, |args: &[Value]| -> Result<Value> {
            Ok(Value::Array(args.to_vec()))
        })
        .with_return_type_hint("any[]"),
    );
    let executor = Arc::new(CommandExecutor::new(commands, None));

    tokio::select! {
        () = connection_loop(&config, &executor) => Ok(()),
        _ = tokio::signal::ctrl_c() => Ok(()),
    }
}

async fn connection_loop(config: &BridgeConfig, executor: &Arc<CommandExecutor>) {
    let identifiers = Arc::new(IdentifierRegistry::with_well_known());
    loop {
        match UnixStream::connect(&config.socket_path).await {
            Ok(stream) => {
                if let Err(e) = serve(stream, &identifiers, executor).await {
                    tracing::error!("Connection failed: {e}");
                }
                tracing::info!("Disconnected from host");
            }
            Err(e) => {
                tracing::debug!("Host not reachable at {}: {e}", config.socket_path.display());
                sleep(config.reconnect_delay).await;
            }
        }
    }
}

async fn serve(
    stream: UnixStream,
    identifiers: &Arc<IdentifierRegistry>,
    executor: &Arc<CommandExecutor>,
) -> Result<()> {
    let (reader, writer) = stream.into_split();
    let engine = RpcEngine::start(
        Side::ExtensionHost,
        Arc::clone(identifiers),
        None,
        reader,
        writer,
    );
    engine.register_local(
        ext_host::COMMANDS,
        Arc::new(CommandsService::ext_host(Arc::clone(executor))),
    )?;
    engine.register_local(ext_host::WORKSPACE, Arc::new(WorkspaceMirror::default()))?;
    engine.register_local(ext_host::FILE_SYSTEM_EVENTS, Arc::new(FileEventLog))?;
    engine.register_local(ext_host::EDITOR_TABS, Arc::new(EditorTabLog))?;
    tracing::info!("Connected to host");

    match MainThreadCommands::new(&engine)
        .execute_command(builtin::PING, vec![])
        .await
    {
        Ok(reply) => tracing::info!("Host answered ping with {reply}"),
        Err(e) => tracing::warn!("Ping failed: {e}"),
    }

    engine.closed().await;
    Ok(())
}

// ============================================================================
// Extension-side services
// ============================================================================

/// Mirrors the latest workspace snapshot pushed by the host.
#[derive(Default)]
struct WorkspaceMirror {
    current: Mutex<Option<WorkspaceData>>,
}

impl WorkspaceMirror {
    fn replace(&self, data: Option<WorkspaceData>) {
        match &data {
            Some(data) => tracing::info!(
                "Workspace {} ({}) with {} folders",
                data.id,
                data.name,
                data.folders.len()
            ),
            None => tracing::info!("Workspace closed"),
        }
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = data;
    }
}

#[async_trait]
impl RpcService for WorkspaceMirror {
    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        match method {
            methods::INITIALIZE_WORKSPACE | methods::ACCEPT_WORKSPACE_DATA => {
                let data: Option<WorkspaceData> = arg(method, &args, 0)?;
                self.replace(data);
                Ok(Value::Null)
            }
            _ => Err(unknown(ext_host::WORKSPACE.name(), method)),
        }
    }
}

struct FileEventLog;

#[async_trait]
impl RpcService for FileEventLog {
    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        if method != methods::ON_FILE_EVENT {
            return Err(unknown(ext_host::FILE_SYSTEM_EVENTS.name(), method));
        }
        let payload: FileEventsPayload = arg(method, &args, 0)?;
        tracing::info!(
            "{}: {} created, {} changed, {} deleted",
            payload.session,
            payload.created.len(),
            payload.changed.len(),
            payload.deleted.len()
        );
        Ok(Value::Null)
    }
}

struct EditorTabLog;

#[async_trait]
impl RpcService for EditorTabLog {
    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        if method != methods::ACCEPT_EDITOR_TAB_MODEL {
            return Err(unknown(ext_host::EDITOR_TABS.name(), method));
        }
        let tabs: Vec<EditorTab> = arg(method, &args, 0)?;
        let active = tabs.iter().find(|tab| tab.is_active).map(|tab| tab.label.as_str());
        tracing::info!("{} editor tabs, active: {active:?}", tabs.len());
        Ok(Value::Null)
    }
}

fn unknown(target: &str, method: &str) -> Error {
    Error::UnknownMethod {
        target: target.to_string(),
        method: method.to_string(),
    }
}
