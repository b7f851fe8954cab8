use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{FolderChange, FolderEntry, WorkspaceManager};
use crate::{
    error::{Error, Result},
    rpc::{arg, methods, RpcService},
    uri::UriParts,
};

/// Host side of `MainThreadWorkspace`: folder changes requested by extensions.
pub struct MainThreadWorkspaceService {
    manager: Arc<WorkspaceManager>,
}

impl MainThreadWorkspaceService {
    pub const fn new(manager: Arc<WorkspaceManager>) -> Self {
        Self { manager }
    }

    fn update_workspace_folders(&self, args: &[Value]) -> Result<Value> {
        let method = methods::UPDATE_WORKSPACE_FOLDERS;
        let workspace_id: String = arg(method, args, 0)?;
        let start: usize = arg(method, args, 1)?;
        let delete_count: usize = arg(method, args, 2)?;
        let folders: Option<Vec<FolderChange>> = arg(method, args, 3)?;

        let additions = folders
            .unwrap_or_default()
            .into_iter()
            .map(|change| to_entry(method, change))
            .collect::<Result<Vec<_>>>()?;
        self.manager
            .update_folders(&workspace_id, start, delete_count, additions)?;
        Ok(Value::Null)
    }
}

/// Incoming identifiers are already native here.
fn to_entry(method: &str, change: FolderChange) -> Result<FolderEntry> {
    let path = UriParts::parse(&change.uri)
        .ok()
        .and_then(|parts| parts.to_file_path())
        .ok_or_else(|| Error::invalid_arguments(method, format!("{} is not a host folder", change.uri)))?;
    Ok(match change.name {
        Some(name) => FolderEntry::named(path, name),
        None => FolderEntry::from(path),
    })
}

#[async_trait]
impl RpcService for MainThreadWorkspaceService {
    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        match method {
            methods::UPDATE_WORKSPACE_FOLDERS => self.update_workspace_folders(&args),
            other => Err(Error::UnknownMethod {
                target: "MainThreadWorkspace".to_string(),
                method: other.to_string(),
            }),
        }
    }
}
