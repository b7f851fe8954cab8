//! Registered workspaces, their watchers and their pushes to the extension host.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, RwLock, Weak},
    time::Duration,
};

use super::{
    EditorTab, FileChangeAggregator, FileEventSink, FolderEntry, RawChange, WorkspaceData,
    WorkspaceWatcher,
};
use crate::{
    bus::{BusScope, DeliveryMode, EditorTabsChanged, EventBus, Subscription, UiDispatcher, WorkspaceChanged},
    error::{Error, Result},
    rpc::{ExtHostEditorTabs, ExtHostFileSystemEvents, ExtHostWorkspace, RpcEngine},
};

/// Extension host services a workspace pushes to.
#[derive(Clone)]
pub struct RemoteWorkspace {
    workspace: ExtHostWorkspace,
    file_events: ExtHostFileSystemEvents,
    editor_tabs: ExtHostEditorTabs,
}

impl RemoteWorkspace {
    pub fn new(engine: &Arc<RpcEngine>) -> Self {
        Self {
            workspace: ExtHostWorkspace::new(engine),
            file_events: ExtHostFileSystemEvents::new(engine),
            editor_tabs: ExtHostEditorTabs::new(engine),
        }
    }
}

/// State of one registered workspace.
pub struct WorkspaceSession {
    id: String,
    name: String,
    bus: Arc<EventBus>,
    folders: Mutex<Vec<FolderEntry>>,
    data: RwLock<WorkspaceData>,
    aggregator: RwLock<Arc<FileChangeAggregator>>,
    watcher: Mutex<Option<WorkspaceWatcher>>,
    _tab_forwarder: Subscription,
}

impl WorkspaceSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn data(&self) -> WorkspaceData {
        self.data.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn folders(&self) -> Vec<FolderEntry> {
        self.folders.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

pub struct WorkspaceManager {
    this: Weak<Self>,
    app_bus: Arc<EventBus>,
    ui: Option<UiDispatcher>,
    stream_capacity: usize,
    batch_window: Duration,
    sessions: RwLock<HashMap<String, Arc<WorkspaceSession>>>,
    remote: RwLock<Option<RemoteWorkspace>>,
}

impl WorkspaceManager {
    pub fn new(
        app_bus: Arc<EventBus>,
        ui: Option<UiDispatcher>,
        stream_capacity: usize,
        batch_window: Duration,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            app_bus,
            ui,
            stream_capacity,
            batch_window,
            sessions: RwLock::new(HashMap::new()),
            remote: RwLock::new(None),
        })
    }

    /// Start pushing to the extension host. Every registered workspace is
    /// announced right away.
    ///
    /// The remote is stored before the registered set is read: `open` inserts
    /// before it reads the remote, so a concurrent open is announced by one
    /// side or the other.
    pub fn attach_remote(&self, remote: RemoteWorkspace) {
        *self.remote.write().unwrap_or_else(PoisonError::into_inner) = Some(remote.clone());
        for session in self.sessions() {
            if let Err(e) = remote.workspace.initialize_workspace(&session.data()) {
                tracing::warn!("Failed to announce workspace {}: {e}", session.id);
            }
        }
    }

    pub fn detach_remote(&self) {
        self.remote.write().unwrap_or_else(PoisonError::into_inner).take();
    }

    fn remote(&self) -> Option<RemoteWorkspace> {
        self.remote.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Register a workspace, start watching its folders and push the
    /// initial snapshot.
    pub fn open(
        &self,
        id: &str,
        name: &str,
        folders: Vec<FolderEntry>,
    ) -> Result<Arc<WorkspaceSession>> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if sessions.contains_key(id) {
            return Err(Error::DuplicateRegistration(id.to_string()));
        }

        let data = WorkspaceData::from_folders(id, name, &folders);
        let bus = EventBus::new(
            BusScope::Workspace(id.to_string()),
            self.stream_capacity,
            self.ui.clone(),
        );
        let aggregator = Arc::new(self.aggregator_for(id, &folders));
        let watcher = self.watch(id, &folders)?;

        let this = self.this.clone();
        let tab_forwarder = bus.try_subscribe::<EditorTabsChanged>(DeliveryMode::Inline, move |tabs| {
            let remote = this.upgrade().and_then(|manager| manager.remote());
            match remote {
                Some(remote) => remote.editor_tabs.accept_editor_tab_model(tabs),
                None => Ok(()),
            }
        });

        let session = Arc::new(WorkspaceSession {
            id: id.to_string(),
            name: name.to_string(),
            bus,
            folders: Mutex::new(folders),
            data: RwLock::new(data.clone()),
            aggregator: RwLock::new(aggregator),
            watcher: Mutex::new(Some(watcher)),
            _tab_forwarder: tab_forwarder,
        });
        sessions.insert(id.to_string(), Arc::clone(&session));
        drop(sessions);

        tracing::info!("Opened workspace {id} with {} folders", data.folders.len());
        session.bus.publish::<WorkspaceChanged>(data.clone());
        self.app_bus.publish::<WorkspaceChanged>(data.clone());
        if let Some(remote) = self.remote() {
            remote.workspace.initialize_workspace(&data)?;
        }
        Ok(session)
    }

    /// Replace the folder set of a workspace and push the new snapshot.
    pub fn set_folders(&self, id: &str, folders: Vec<FolderEntry>) -> Result<WorkspaceData> {
        let session = self.require(id)?;

        let data = WorkspaceData::from_folders(id, &session.name, &folders);
        let watcher = self.watch(id, &folders)?;
        *session.aggregator.write().unwrap_or_else(PoisonError::into_inner) =
            Arc::new(self.aggregator_for(id, &folders));
        *session.watcher.lock().unwrap_or_else(PoisonError::into_inner) = Some(watcher);
        *session.folders.lock().unwrap_or_else(PoisonError::into_inner) = folders;
        *session.data.write().unwrap_or_else(PoisonError::into_inner) = data.clone();

        tracing::info!("Workspace {id} now has {} folders", data.folders.len());
        session.bus.publish::<WorkspaceChanged>(data.clone());
        self.app_bus.publish::<WorkspaceChanged>(data.clone());
        if let Some(remote) = self.remote() {
            remote.workspace.accept_workspace_data(Some(&data))?;
        }
        Ok(data)
    }

    /// Replace `delete_count` folders at `start` with `additions`.
    pub fn update_folders(
        &self,
        id: &str,
        start: usize,
        delete_count: usize,
        additions: Vec<FolderEntry>,
    ) -> Result<WorkspaceData> {
        let mut folders = self.require(id)?.folders();
        if start > folders.len() {
            return Err(Error::invalid_arguments(
                "updateWorkspaceFolders",
                format!("start {start} is past the {} folders", folders.len()),
            ));
        }
        let end = start.saturating_add(delete_count).min(folders.len());
        folders.splice(start..end, additions);
        self.set_folders(id, folders)
    }

    /// Unregister a workspace. Its watchers stop and the extension host is
    /// told the workspace is gone.
    pub fn close(&self, id: &str) -> Result<()> {
        let session = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .ok_or_else(|| Error::MissingWorkspaceContext(id.to_string()))?;
        session
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        tracing::info!("Closed workspace {id}");
        if let Some(remote) = self.remote() {
            remote.workspace.accept_workspace_data(None)?;
        }
        Ok(())
    }

    pub fn close_all(&self) {
        for id in self.ids() {
            if let Err(e) = self.close(&id) {
                tracing::warn!("Failed to close workspace {id}: {e}");
            }
        }
    }

    /// Feed one raw batch through the workspace's aggregator. Batches for a
    /// workspace that is no longer registered are dropped.
    pub fn dispatch_batch(&self, id: &str, batch: Vec<RawChange>) {
        let session = match self.require(id) {
            Ok(session) => session,
            Err(e) => {
                tracing::debug!("Dropping {} raw changes: {e}", batch.len());
                return;
            }
        };
        let aggregator = Arc::clone(
            &session
                .aggregator
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let remote = self.remote();
        let sink = remote
            .as_ref()
            .map(|remote| &remote.file_events as &dyn FileEventSink);
        aggregator.process_batch(batch, &session.bus, sink);
    }

    /// Publish a new editor tab model for a workspace.
    pub fn set_editor_tabs(&self, id: &str, tabs: Vec<EditorTab>) -> Result<()> {
        self.require(id)?.bus.publish::<EditorTabsChanged>(tabs);
        Ok(())
    }

    pub fn session(&self, id: &str) -> Option<Arc<WorkspaceSession>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn state(&self, id: &str) -> Option<WorkspaceData> {
        self.session(id).map(|session| session.data())
    }

    /// Registered workspace ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    fn sessions(&self) -> Vec<Arc<WorkspaceSession>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    fn require(&self, id: &str) -> Result<Arc<WorkspaceSession>> {
        self.session(id)
            .ok_or_else(|| Error::MissingWorkspaceContext(id.to_string()))
    }

    fn aggregator_for(&self, id: &str, folders: &[FolderEntry]) -> FileChangeAggregator {
        let roots: Vec<_> = folders.iter().map(|f| f.path.clone()).collect();
        let aggregator = FileChangeAggregator::new(id, roots.clone());
        for root in roots {
            aggregator.remember_directory(root);
        }
        aggregator
    }

    fn watch(&self, id: &str, folders: &[FolderEntry]) -> Result<WorkspaceWatcher> {
        let paths: Vec<_> = folders.iter().map(|f| f.path.clone()).collect();
        let this = self.this.clone();
        let id = id.to_string();
        WorkspaceWatcher::start(&paths, self.batch_window, move |batch| {
            if let Some(manager) = this.upgrade() {
                manager.dispatch_batch(&id, batch);
            }
        })
    }
}
