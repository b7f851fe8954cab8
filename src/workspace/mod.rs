//! Workspaces and the filesystem changes that flow out of them.
//!
//! ```text
//! notify ─▶ WorkspaceWatcher ─batch─▶ FileChangeAggregator ─┬─▶ workspace EventBus
//!                                                         └─▶ $onFileEvent
//! ```

mod aggregator;
mod data;
pub mod filter;
mod manager;
mod service;
mod watcher;

pub use aggregator::{BatchSummary, FileChangeAggregator, FileEventSink, RawChange, RawChangeKind};
pub use data::{
    ChangeKind, EditorTab, FileEventsPayload, FolderChange, FolderEntry, ItemKind, WorkspaceData,
    WorkspaceFileChangeData, WorkspaceFolder,
};
pub use manager::{RemoteWorkspace, WorkspaceManager, WorkspaceSession};
pub use service::MainThreadWorkspaceService;
pub use watcher::WorkspaceWatcher;
