//! Top-level wiring of the host side.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    bus::{BusScope, ConnectionChanged, ConnectionState, EventBus, UiDispatcher},
    commands::{builtin, CommandExecutor, CommandRegistry, CommandsService},
    config::BridgeConfig,
    error::Result,
    rpc::{main_thread, ExtHostCommands, IdentifierRegistry, RpcEngine, Side},
    uri::UriTransformer,
    workspace::{MainThreadWorkspaceService, RemoteWorkspace, WorkspaceManager},
};

/// Owns every long-lived host component.
///
/// Built in dependency order: registries, UI thread, application bus,
/// translator, workspaces, then the built-in commands that read them.
pub struct BridgeContext {
    config: BridgeConfig,
    identifiers: Arc<IdentifierRegistry>,
    commands: Arc<CommandRegistry>,
    ui: UiDispatcher,
    app_bus: Arc<EventBus>,
    transformer: Arc<UriTransformer>,
    workspaces: Arc<WorkspaceManager>,
    executor: Arc<CommandExecutor>,
}

impl BridgeContext {
    pub fn new(config: BridgeConfig) -> Result<Self> {
        let identifiers = Arc::new(IdentifierRegistry::with_well_known());
        let commands = Arc::new(CommandRegistry::new());
        let ui = UiDispatcher::spawn("bridge-ui")?;
        let app_bus = EventBus::new(
            BusScope::Application,
            config.stream_capacity,
            Some(ui.clone()),
        );
        let transformer = Arc::new(UriTransformer::new(config.remote_authority.clone()));
        let workspaces = WorkspaceManager::new(
            Arc::clone(&app_bus),
            Some(ui.clone()),
            config.stream_capacity,
            config.batch_window,
        );
        builtin::register_builtins(&commands, &workspaces);
        let executor = Arc::new(CommandExecutor::new(
            Arc::clone(&commands),
            Some(ui.clone()),
        ));

        Ok(Self {
            config,
            identifiers,
            commands,
            ui,
            app_bus,
            transformer,
            workspaces,
            executor,
        })
    }

    pub const fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn commands(&self) -> &Arc<CommandRegistry> {
        &self.commands
    }

    pub fn executor(&self) -> &Arc<CommandExecutor> {
        &self.executor
    }

    pub fn app_bus(&self) -> &Arc<EventBus> {
        &self.app_bus
    }

    pub fn workspaces(&self) -> &Arc<WorkspaceManager> {
        &self.workspaces
    }

    /// Attach an extension host connection: serve the host services on it
    /// and route extension-bound traffic through it.
    pub fn connect<R, W>(&self, reader: R, writer: W) -> Result<Arc<RpcEngine>>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let engine = RpcEngine::start(
            Side::Host,
            Arc::clone(&self.identifiers),
            Some(Arc::clone(&self.transformer)),
            reader,
            writer,
        );
        engine.register_local(
            main_thread::COMMANDS,
            Arc::new(CommandsService::main_thread(Arc::clone(&self.executor))),
        )?;
        engine.register_local(
            main_thread::WORKSPACE,
            Arc::new(MainThreadWorkspaceService::new(Arc::clone(&self.workspaces))),
        )?;

        self.executor.attach_remote(ExtHostCommands::new(&engine));
        self.workspaces.attach_remote(RemoteWorkspace::new(&engine));
        self.app_bus
            .publish::<ConnectionChanged>(ConnectionState::Connected);
        Ok(engine)
    }

    pub fn disconnect(&self, engine: &RpcEngine) {
        self.executor.detach_remote();
        self.workspaces.detach_remote();
        engine.close();
        self.app_bus
            .publish::<ConnectionChanged>(ConnectionState::Disconnected);
    }

    /// Close every workspace and stop the UI thread.
    pub fn shutdown(&self) {
        self.workspaces.close_all();
        self.ui.shutdown();
    }
}
