//! Call-through stubs for services on the other side.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{
    engine::RpcEngine,
    identifier::{ext_host, main_thread, ProxyIdentifier},
    protocol::to_value,
};
use crate::{
    error::Result,
    workspace::{EditorTab, FileEventSink, FileEventsPayload, FolderChange, WorkspaceData},
};

/// Method names of the well-known services.
pub mod methods {
    pub const EXECUTE_COMMAND: &str = "$executeCommand";
    pub const GET_COMMANDS: &str = "$getCommands";
    pub const UPDATE_WORKSPACE_FOLDERS: &str = "$updateWorkspaceFolders";

    pub const EXECUTE_CONTRIBUTED_COMMAND: &str = "$executeContributedCommand";
    pub const GET_CONTRIBUTED_COMMANDS: &str = "$getContributedCommands";
    pub const INITIALIZE_WORKSPACE: &str = "$initializeWorkspace";
    pub const ACCEPT_WORKSPACE_DATA: &str = "$acceptWorkspaceData";
    pub const ON_FILE_EVENT: &str = "$onFileEvent";
    pub const ACCEPT_EDITOR_TAB_MODEL: &str = "$acceptEditorTabModel";
}

/// Every method call becomes a request addressed to `identifier` on the
/// other side. Nothing fails up front; failures arrive with the outcome.
#[derive(Clone)]
pub struct Proxy {
    identifier: ProxyIdentifier,
    engine: Arc<RpcEngine>,
}

impl Proxy {
    pub(super) fn new(identifier: ProxyIdentifier, engine: Arc<RpcEngine>) -> Self {
        Self { identifier, engine }
    }

    pub const fn identifier(&self) -> ProxyIdentifier {
        self.identifier
    }

    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        self.engine.call(self.identifier, method, args).await
    }

    pub async fn call_as<T: DeserializeOwned>(&self, method: &str, args: Vec<Value>) -> Result<T> {
        let value = self.call(method, args).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn notify(&self, method: &str, args: Vec<Value>) {
        self.engine.notify(self.identifier, method, args);
    }
}

// ============================================================================
// Extension host services
// ============================================================================

#[derive(Clone)]
pub struct ExtHostWorkspace(Proxy);

impl ExtHostWorkspace {
    pub fn new(engine: &Arc<RpcEngine>) -> Self {
        Self(engine.proxy(ext_host::WORKSPACE))
    }

    pub fn initialize_workspace(&self, data: &WorkspaceData) -> Result<()> {
        self.0
            .notify(methods::INITIALIZE_WORKSPACE, vec![to_value(data)?]);
        Ok(())
    }

    /// Push a replacement snapshot; `None` means the workspace closed.
    pub fn accept_workspace_data(&self, data: Option<&WorkspaceData>) -> Result<()> {
        self.0
            .notify(methods::ACCEPT_WORKSPACE_DATA, vec![to_value(&data)?]);
        Ok(())
    }
}

#[derive(Clone)]
pub struct ExtHostFileSystemEvents(Proxy);

impl ExtHostFileSystemEvents {
    pub fn new(engine: &Arc<RpcEngine>) -> Self {
        Self(engine.proxy(ext_host::FILE_SYSTEM_EVENTS))
    }
}

impl FileEventSink for ExtHostFileSystemEvents {
    fn on_file_event(&self, payload: &FileEventsPayload) {
        match to_value(payload) {
            Ok(value) => self.0.notify(methods::ON_FILE_EVENT, vec![value]),
            Err(e) => tracing::warn!("Failed to encode file events: {e}"),
        }
    }
}

#[derive(Clone)]
pub struct ExtHostEditorTabs(Proxy);

impl ExtHostEditorTabs {
    pub fn new(engine: &Arc<RpcEngine>) -> Self {
        Self(engine.proxy(ext_host::EDITOR_TABS))
    }

    pub fn accept_editor_tab_model(&self, tabs: &[EditorTab]) -> Result<()> {
        self.0
            .notify(methods::ACCEPT_EDITOR_TAB_MODEL, vec![to_value(&tabs)?]);
        Ok(())
    }
}

#[derive(Clone)]
pub struct ExtHostCommands(Proxy);

impl ExtHostCommands {
    pub fn new(engine: &Arc<RpcEngine>) -> Self {
        Self(engine.proxy(ext_host::COMMANDS))
    }

    pub async fn execute_contributed_command(&self, id: &str, args: Vec<Value>) -> Result<Value> {
        self.0
            .call(
                methods::EXECUTE_CONTRIBUTED_COMMAND,
                vec![Value::from(id), Value::Array(args)],
            )
            .await
    }

    pub async fn get_contributed_commands(&self) -> Result<Vec<String>> {
        self.0
            .call_as(methods::GET_CONTRIBUTED_COMMANDS, vec![])
            .await
    }
}

// ============================================================================
// Host services
// ============================================================================

#[derive(Clone)]
pub struct MainThreadCommands(Proxy);

impl MainThreadCommands {
    pub fn new(engine: &Arc<RpcEngine>) -> Self {
        Self(engine.proxy(main_thread::COMMANDS))
    }

    pub async fn execute_command(&self, id: &str, args: Vec<Value>) -> Result<Value> {
        self.0
            .call(
                methods::EXECUTE_COMMAND,
                vec![Value::from(id), Value::Array(args)],
            )
            .await
    }

    pub async fn get_commands(&self) -> Result<Vec<String>> {
        self.0.call_as(methods::GET_COMMANDS, vec![]).await
    }
}

#[derive(Clone)]
pub struct MainThreadWorkspace(Proxy);

impl MainThreadWorkspace {
    pub fn new(engine: &Arc<RpcEngine>) -> Self {
        Self(engine.proxy(main_thread::WORKSPACE))
    }

    /// Replace `delete_count` folders at `start` with `folders`.
    pub async fn update_workspace_folders(
        &self,
        workspace_id: &str,
        start: usize,
        delete_count: usize,
        folders: &[FolderChange],
    ) -> Result<()> {
        self.0
            .call(
                methods::UPDATE_WORKSPACE_FOLDERS,
                vec![
                    Value::from(workspace_id),
                    Value::from(start),
                    Value::from(delete_count),
                    to_value(&folders)?,
                ],
            )
            .await?;
        Ok(())
    }
}
