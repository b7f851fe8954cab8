//! Host-side endpoint: accepts extension host connections on a Unix socket.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tokio::net::{UnixListener, UnixStream};

use crate::{
    app::BridgeContext,
    bus::{Event, EventStream},
    config::BridgeConfig,
    error::Result,
    workspace::FolderEntry,
};

/// The workspace opened for every extension host that connects.
#[derive(Debug, Clone)]
pub struct WorkspaceSpec {
    pub id: String,
    pub name: String,
    pub folders: Vec<PathBuf>,
}

pub async fn run(config: BridgeConfig, workspace: WorkspaceSpec) -> Result<()> {
    let context = BridgeContext::new(config)?;
    let path = context.config().socket_path.clone();
    let listener = bind(&path)?;
    tracing::info!("Listening on {}", path.display());

    tokio::spawn(log_activity(context.app_bus().stream()));

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    if handle_connection(&context, stream, &workspace).await == Flow::Stop {
                        break;
                    }
                }
                Err(e) => tracing::error!("Accept error: {e}"),
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    tracing::info!("Shutting down");
    context.shutdown();
    if let Err(e) = fs::remove_file(&path) {
        tracing::debug!("Failed to remove socket {}: {e}", path.display());
    }
    Ok(())
}

fn bind(path: &Path) -> Result<UnixListener> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(UnixListener::bind(path)?)
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Serve one extension host until it disconnects.
async fn handle_connection(
    context: &BridgeContext,
    stream: UnixStream,
    workspace: &WorkspaceSpec,
) -> Flow {
    let (reader, writer) = stream.into_split();
    let engine = match context.connect(reader, writer) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!("Failed to attach extension host: {e}");
            return Flow::Continue;
        }
    };
    tracing::info!("Extension host connected");

    let folders = workspace.folders.iter().cloned().map(FolderEntry::from).collect();
    let opened = context
        .workspaces()
        .open(&workspace.id, &workspace.name, folders);
    if let Err(e) = &opened {
        tracing::error!("Failed to open workspace {}: {e}", workspace.id);
    }

    let flow = tokio::select! {
        () = engine.closed() => Flow::Continue,
        _ = tokio::signal::ctrl_c() => Flow::Stop,
    };

    tracing::info!("Extension host disconnected");
    if opened.is_ok() {
        if let Err(e) = context.workspaces().close(&workspace.id) {
            tracing::debug!("Workspace {} already closed: {e}", workspace.id);
        }
    }
    context.disconnect(&engine);
    flow
}

async fn log_activity(mut events: EventStream) {
    while let Some(event) = events.recv().await {
        match event.as_ref() {
            Event::WorkspaceChanged(data) => {
                tracing::info!("Workspace {} has {} folders", data.id, data.folders.len());
            }
            Event::ConnectionChanged(state) => tracing::info!("Connection {state:?}"),
            other => tracing::debug!("Event {}", other.topic_name()),
        }
    }
}
