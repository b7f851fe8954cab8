use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
    time::SystemTime,
};

use super::{
    filter, ChangeKind, FileEventsPayload, ItemKind, WorkspaceFileChangeData,
};
use crate::{
    bus::{DirectoriesChanged, DirectoryChanged, EventBus, FileChanged, FilesChanged},
    uri::UriParts,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawChangeKind {
    Create,
    Remove,
    Modify,
    Other,
}

/// One notification as reported by the OS watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChange {
    pub path: PathBuf,
    pub kind: RawChangeKind,
}

impl RawChange {
    pub fn new(path: impl Into<PathBuf>, kind: RawChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Receiver of the batched cross-process notification.
pub trait FileEventSink: Send + Sync {
    fn on_file_event(&self, payload: &FileEventsPayload);
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub files: Vec<WorkspaceFileChangeData>,
    pub directories: Vec<WorkspaceFileChangeData>,
    pub filtered: usize,
}

/// Turns raw watcher batches into classified, partitioned changes.
pub struct FileChangeAggregator {
    session: String,
    roots: Vec<PathBuf>,
    known_directories: Mutex<HashSet<PathBuf>>,
}

impl FileChangeAggregator {
    pub fn new(session: impl Into<String>, roots: Vec<PathBuf>) -> Self {
        Self {
            session: session.into(),
            roots,
            known_directories: Mutex::new(HashSet::new()),
        }
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    /// Classify, partition and fan out one batch.
    ///
    /// Each partition goes out three ways: one event per change, one bulk
    /// event, and one call on `remote`. Empty partitions emit nothing.
    pub fn process_batch(
        &self,
        batch: Vec<RawChange>,
        bus: &EventBus,
        remote: Option<&dyn FileEventSink>,
    ) -> BatchSummary {
        let _span = tracing::info_span!("file_batch", session = %self.session, size = batch.len())
            .entered();

        let mut summary = BatchSummary::default();
        for change in &batch {
            match self.classify(change) {
                Some(data) if data.item_kind == ItemKind::Directory => summary.directories.push(data),
                Some(data) => summary.files.push(data),
                None => summary.filtered += 1,
            }
        }

        if !summary.files.is_empty() {
            for change in &summary.files {
                bus.publish::<FileChanged>(change.clone());
            }
            bus.publish::<FilesChanged>(summary.files.clone());
            if let Some(remote) = remote {
                remote.on_file_event(&FileEventsPayload::from_changes(&self.session, &summary.files));
            }
        }
        if !summary.directories.is_empty() {
            for change in &summary.directories {
                bus.publish::<DirectoryChanged>(change.clone());
            }
            bus.publish::<DirectoriesChanged>(summary.directories.clone());
            if let Some(remote) = remote {
                remote.on_file_event(&FileEventsPayload::from_changes(
                    &self.session,
                    &summary.directories,
                ));
            }
        }

        tracing::debug!(
            "{} file, {} directory changes, {} filtered",
            summary.files.len(),
            summary.directories.len(),
            summary.filtered
        );
        summary
    }

    /// Classify one raw change, or `None` when it is noise.
    pub fn classify(&self, change: &RawChange) -> Option<WorkspaceFileChangeData> {
        let root = self.root_of(&change.path);
        if filter::is_hidden(root, &change.path) {
            return None;
        }

        let change_kind = match change.kind {
            RawChangeKind::Create => ChangeKind::Created,
            RawChangeKind::Remove => ChangeKind::Deleted,
            RawChangeKind::Modify | RawChangeKind::Other => ChangeKind::Updated,
        };
        let item_kind = self.item_kind(&change.path, change_kind);
        if filter::is_ignored(root, &change.path, item_kind) {
            return None;
        }

        let Some(resource) = UriParts::from_file_path(&change.path) else {
            tracing::debug!("Skipping {}: not an absolute path", change.path.display());
            return None;
        };
        Some(WorkspaceFileChangeData {
            resource,
            path: change.path.clone(),
            change_kind,
            item_kind,
            timestamp: SystemTime::now(),
        })
    }

    /// Current kind on disk. Gone items report the kind they were last seen as.
    fn item_kind(&self, path: &Path, change_kind: ChangeKind) -> ItemKind {
        let mut known = self
            .known_directories
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match fs::symlink_metadata(path) {
            Ok(meta) if meta.is_dir() => {
                known.insert(path.to_path_buf());
                ItemKind::Directory
            }
            Ok(_) => {
                known.remove(path);
                ItemKind::File
            }
            Err(_) => {
                let was_directory = if change_kind == ChangeKind::Deleted {
                    known.remove(path)
                } else {
                    known.contains(path)
                };
                if was_directory {
                    ItemKind::Directory
                } else {
                    ItemKind::File
                }
            }
        }
    }

    /// Remember `path` as a directory, so its later deletion is classified
    /// correctly even though it is gone by then.
    pub fn remember_directory(&self, path: PathBuf) {
        self.known_directories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path);
    }

    fn root_of(&self, path: &Path) -> Option<&Path> {
        self.roots
            .iter()
            .filter(|root| path.starts_with(root))
            .max_by_key(|root| root.components().count())
            .map(PathBuf::as_path)
    }
}
