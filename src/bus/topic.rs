use serde::{Deserialize, Serialize};

use crate::workspace::{EditorTab, WorkspaceData, WorkspaceFileChangeData};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

/// Everything that can travel over an [`EventBus`](super::EventBus).
#[derive(Debug, Clone)]
pub enum Event {
    FileChanged(WorkspaceFileChangeData),
    FilesChanged(Vec<WorkspaceFileChangeData>),
    DirectoryChanged(WorkspaceFileChangeData),
    DirectoriesChanged(Vec<WorkspaceFileChangeData>),
    WorkspaceChanged(WorkspaceData),
    EditorTabsChanged(Vec<EditorTab>),
    ConnectionChanged(ConnectionState),
}

impl Event {
    pub const fn topic_name(&self) -> &'static str {
        match self {
            Self::FileChanged(_) => FileChanged::NAME,
            Self::FilesChanged(_) => FilesChanged::NAME,
            Self::DirectoryChanged(_) => DirectoryChanged::NAME,
            Self::DirectoriesChanged(_) => DirectoriesChanged::NAME,
            Self::WorkspaceChanged(_) => WorkspaceChanged::NAME,
            Self::EditorTabsChanged(_) => EditorTabsChanged::NAME,
            Self::ConnectionChanged(_) => ConnectionChanged::NAME,
        }
    }
}

/// A typed event kind. Implementors are uninhabited markers.
pub trait Topic: 'static {
    type Payload: Clone + Send + Sync + 'static;
    const NAME: &'static str;

    fn wrap(payload: Self::Payload) -> Event;
    fn extract(event: &Event) -> Option<&Self::Payload>;
}

macro_rules! topic {
    ($(#[$doc:meta])* $marker:ident($payload:ty) = $name:literal) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub enum $marker {}

        impl Topic for $marker {
            type Payload = $payload;
            const NAME: &'static str = $name;

            fn wrap(payload: Self::Payload) -> Event {
                Event::$marker(payload)
            }

            fn extract(event: &Event) -> Option<&Self::Payload> {
                match event {
                    Event::$marker(payload) => Some(payload),
                    _ => None,
                }
            }
        }
    };
}

topic!(
    /// One file changed.
    FileChanged(WorkspaceFileChangeData) = "fileChanged"
);
topic!(
    /// Every file change of one batch.
    FilesChanged(Vec<WorkspaceFileChangeData>) = "filesChanged"
);
topic!(
    /// One directory changed.
    DirectoryChanged(WorkspaceFileChangeData) = "directoryChanged"
);
topic!(
    /// Every directory change of one batch.
    DirectoriesChanged(Vec<WorkspaceFileChangeData>) = "directoriesChanged"
);
topic!(WorkspaceChanged(WorkspaceData) = "workspaceChanged");
topic!(EditorTabsChanged(Vec<EditorTab>) = "editorTabsChanged");
topic!(ConnectionChanged(ConnectionState) = "connectionChanged");
