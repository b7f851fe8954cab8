//! OS filesystem notifications, gathered into batches.

use std::{path::PathBuf, time::Duration};

use notify::{
    event::{ModifyKind, RenameMode},
    Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use tokio::{sync::mpsc, task::JoinHandle, time::Instant};

use super::{RawChange, RawChangeKind};
use crate::error::Result;

/// Recursive watches on a set of folders. Dropping it stops everything.
pub struct WorkspaceWatcher {
    _watchers: Vec<RecommendedWatcher>,
    batcher: JoinHandle<()>,
}

impl WorkspaceWatcher {
    /// Watch `folders` and call `on_batch` with every change seen within one
    /// `window` of the first change of a batch.
    pub fn start(
        folders: &[PathBuf],
        window: Duration,
        on_batch: impl Fn(Vec<RawChange>) + Send + 'static,
    ) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watchers = Vec::with_capacity(folders.len());
        for folder in folders {
            let tx = tx.clone();
            let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
                match res {
                    Ok(event) => {
                        let changes = raw_changes(event);
                        if !changes.is_empty() && tx.send(changes).is_err() {
                            tracing::debug!("Watcher batch loop is gone");
                        }
                    }
                    Err(e) => tracing::warn!("File watcher error: {e}"),
                }
            })?;
            watcher.watch(folder, RecursiveMode::Recursive)?;
            tracing::debug!("Watching {}", folder.display());
            watchers.push(watcher);
        }

        let batcher = tokio::spawn(batch_loop(rx, window, on_batch));
        Ok(Self {
            _watchers: watchers,
            batcher,
        })
    }
}

impl Drop for WorkspaceWatcher {
    fn drop(&mut self) {
        self.batcher.abort();
    }
}

async fn batch_loop(
    mut rx: mpsc::UnboundedReceiver<Vec<RawChange>>,
    window: Duration,
    on_batch: impl Fn(Vec<RawChange>),
) {
    while let Some(mut batch) = rx.recv().await {
        let deadline = Instant::now() + window;
        loop {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(more)) => batch.extend(more),
                Ok(None) => {
                    on_batch(batch);
                    return;
                }
                Err(_) => break,
            }
        }
        on_batch(batch);
    }
}

/// Map one notify event to raw changes. Access events are not changes.
pub fn raw_changes(event: Event) -> Vec<RawChange> {
    let Event { kind, paths, .. } = event;
    let each = |kind: RawChangeKind, paths: Vec<PathBuf>| {
        paths
            .into_iter()
            .map(|path| RawChange::new(path, kind))
            .collect::<Vec<_>>()
    };

    match kind {
        EventKind::Access(_) => Vec::new(),
        EventKind::Create(_) => each(RawChangeKind::Create, paths),
        EventKind::Remove(_) => each(RawChangeKind::Remove, paths),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => each(RawChangeKind::Remove, paths),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => each(RawChangeKind::Create, paths),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut paths = paths.into_iter();
            let mut changes = Vec::new();
            if let Some(from) = paths.next() {
                changes.push(RawChange::new(from, RawChangeKind::Remove));
            }
            changes.extend(paths.map(|to| RawChange::new(to, RawChangeKind::Create)));
            changes
        }
        EventKind::Modify(_) => each(RawChangeKind::Modify, paths),
        EventKind::Any | EventKind::Other => each(RawChangeKind::Other, paths),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use notify::event::{AccessKind, CreateKind, DataChange};
    use tempfile::TempDir;

    use super::*;

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |e, p| e.add_path(PathBuf::from(p)))
    }

    #[test]
    fn test_notify_kind_mapping() {
        let kinds = |changes: Vec<RawChange>| changes.into_iter().map(|c| c.kind).collect::<Vec<_>>();

        assert_eq!(
            kinds(raw_changes(event(EventKind::Create(CreateKind::File), &["/a"]))),
            vec![RawChangeKind::Create]
        );
        assert!(raw_changes(event(EventKind::Access(AccessKind::Any), &["/a"])).is_empty());
        assert_eq!(
            kinds(raw_changes(event(
                EventKind::Modify(ModifyKind::Data(DataChange::Content)),
                &["/a"]
            ))),
            vec![RawChangeKind::Modify]
        );

        let renamed = raw_changes(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/old", "/new"],
        ));
        assert_eq!(
            renamed,
            vec![
                RawChange::new("/old", RawChangeKind::Remove),
                RawChange::new("/new", RawChangeKind::Create),
            ]
        );
        assert_eq!(
            kinds(raw_changes(event(
                EventKind::Modify(ModifyKind::Name(RenameMode::From)),
                &["/gone"]
            ))),
            vec![RawChangeKind::Remove]
        );
    }

    #[tokio::test]
    async fn test_batch_loop_groups_changes_within_window() {
        let (tx, rx) = mpsc::unbounded_channel();
        let batches = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&batches);
        let task = tokio::spawn(batch_loop(rx, Duration::from_millis(100), move |batch| {
            seen.lock().unwrap().push(batch.len());
        }));

        tx.send(vec![RawChange::new("/a", RawChangeKind::Create)]).unwrap();
        tx.send(vec![RawChange::new("/b", RawChangeKind::Create)]).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        tx.send(vec![RawChange::new("/c", RawChangeKind::Modify)]).unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(*batches.lock().unwrap(), vec![2, 1]);
    }

    #[tokio::test]
    async fn test_watcher_reports_created_file() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _watcher = WorkspaceWatcher::start(&[root.clone()], Duration::from_millis(50), move |batch| {
            let _ = tx.send(batch);
        })
        .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        std::fs::write(root.join("new.txt"), "hello").unwrap();

        let batch = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let batch = rx.recv().await.unwrap();
                if batch.iter().any(|c| c.path.ends_with("new.txt")) {
                    return batch;
                }
            }
        })
        .await
        .unwrap();
        assert!(batch
            .iter()
            .any(|c| c.path.ends_with("new.txt") && c.kind != RawChangeKind::Remove));
    }
}
