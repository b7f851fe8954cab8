use std::{path::PathBuf, time::SystemTime};

use serde::{Deserialize, Serialize};

use crate::uri::{UriComponents, UriParts};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemKind {
    File,
    Directory,
}

/// One classified filesystem change.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceFileChangeData {
    /// Native identifier of the changed item.
    pub resource: UriParts,
    pub path: PathBuf,
    pub change_kind: ChangeKind,
    pub item_kind: ItemKind,
    pub timestamp: SystemTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceFolder {
    pub uri: UriComponents,
    pub name: String,
    pub index: usize,
}

/// Full snapshot of one workspace, pushed wholesale on every root change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceData {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transient: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_untitled: Option<bool>,
    pub folders: Vec<WorkspaceFolder>,
}

impl WorkspaceData {
    /// Snapshot listing `folders` in order. Paths that cannot be expressed
    /// as `file` identifiers are skipped.
    pub fn from_folders(id: &str, name: &str, folders: &[FolderEntry]) -> Self {
        let folders = folders
            .iter()
            .filter_map(|entry| {
                let parts = UriParts::from_file_path(&entry.path);
                if parts.is_none() {
                    tracing::warn!(
                        "Skipping workspace folder {}: not an absolute path",
                        entry.path.display()
                    );
                }
                Some((entry, parts?))
            })
            .enumerate()
            .map(|(index, (entry, parts))| WorkspaceFolder {
                uri: UriComponents::from(&parts),
                name: entry.name.clone(),
                index,
            })
            .collect();

        Self {
            id: id.to_string(),
            name: name.to_string(),
            transient: None,
            configuration_uri: None,
            is_untitled: None,
            folders,
        }
    }
}

/// A workspace root as the host tracks it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderEntry {
    pub path: PathBuf,
    pub name: String,
}

impl FolderEntry {
    pub fn named(path: PathBuf, name: impl Into<String>) -> Self {
        Self {
            path,
            name: name.into(),
        }
    }
}

impl From<PathBuf> for FolderEntry {
    fn from(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Self { path, name }
    }
}

/// A folder added through `$updateWorkspaceFolders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderChange {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Payload of `$onFileEvent`: one partition of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEventsPayload {
    pub session: String,
    pub created: Vec<UriComponents>,
    pub changed: Vec<UriComponents>,
    pub deleted: Vec<UriComponents>,
}

impl FileEventsPayload {
    pub fn from_changes(session: &str, changes: &[WorkspaceFileChangeData]) -> Self {
        let mut payload = Self {
            session: session.to_string(),
            ..Self::default()
        };
        for change in changes {
            let components = UriComponents::from(&change.resource);
            match change.change_kind {
                ChangeKind::Created => payload.created.push(components),
                ChangeKind::Updated => payload.changed.push(components),
                ChangeKind::Deleted => payload.deleted.push(components),
            }
        }
        payload
    }

    pub fn len(&self) -> usize {
        self.created.len() + self.changed.len() + self.deleted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorTab {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_uri: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_dirty: bool,
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use serde_json::json;

    use super::*;

    #[test]
    fn test_snapshot_from_folders() {
        let data = WorkspaceData::from_folders(
            "ws-1",
            "demo",
            &[
                FolderEntry::from(PathBuf::from("/home/user/app")),
                FolderEntry::from(PathBuf::from("relative")),
                FolderEntry::named(PathBuf::from("/home/user/lib"), "Library"),
            ],
        );
        assert_eq!(data.folders.len(), 2);
        assert_eq!(data.folders[0].name, "app");
        assert_eq!(data.folders[1].name, "Library");
        assert_eq!(data.folders[1].index, 1);
        assert_eq!(data.folders[1].uri.path, "/home/user/lib");

        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["folders"][0]["uri"]["$mid"], 1);
        assert_eq!(json["folders"][0]["uri"]["scheme"], "file");
        assert!(json.get("isUntitled").is_none());
    }

    #[test]
    fn test_file_events_payload_partitions_by_kind() {
        let change = |path: &str, change_kind| WorkspaceFileChangeData {
            resource: UriParts::from_file_path(Path::new(path)).unwrap(),
            path: PathBuf::from(path),
            change_kind,
            item_kind: ItemKind::File,
            timestamp: SystemTime::now(),
        };
        let payload = FileEventsPayload::from_changes(
            "ws-1",
            &[
                change("/a", ChangeKind::Created),
                change("/b", ChangeKind::Deleted),
                change("/c", ChangeKind::Created),
            ],
        );
        assert_eq!(payload.created.len(), 2);
        assert_eq!(payload.deleted[0].path, "/b");
        assert!(payload.changed.is_empty());
        assert_eq!(payload.len(), 3);

        let tab: EditorTab = serde_json::from_value(json!({
            "label": "main.rs",
            "resourceUri": "file:///main.rs",
            "isActive": true
        }))
        .unwrap();
        assert!(tab.is_active && !tab.is_dirty);
    }
}
