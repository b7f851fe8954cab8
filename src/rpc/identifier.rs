//! Stable names for the services each side exposes.

use std::{
    collections::HashMap,
    fmt,
    sync::{PoisonError, RwLock},
};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The process a service lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Side {
    Host,
    ExtensionHost,
}

impl Side {
    pub const fn opposite(self) -> Self {
        match self {
            Self::Host => Self::ExtensionHost,
            Self::ExtensionHost => Self::Host,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => f.write_str("host"),
            Self::ExtensionHost => f.write_str("extension-host"),
        }
    }
}

/// Name of one remote-callable service on one side of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProxyIdentifier {
    name: &'static str,
    side: Side,
}

impl ProxyIdentifier {
    pub const fn new(name: &'static str, side: Side) -> Self {
        Self { name, side }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn side(&self) -> Side {
        self.side
    }
}

impl fmt::Display for ProxyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Services implemented by the host.
pub mod main_thread {
    use super::{ProxyIdentifier, Side};

    pub const COMMANDS: ProxyIdentifier = ProxyIdentifier::new("MainThreadCommands", Side::Host);
    pub const WORKSPACE: ProxyIdentifier = ProxyIdentifier::new("MainThreadWorkspace", Side::Host);
}

/// Services implemented by the extension host.
pub mod ext_host {
    use super::{ProxyIdentifier, Side};

    pub const COMMANDS: ProxyIdentifier =
        ProxyIdentifier::new("ExtHostCommands", Side::ExtensionHost);
    pub const WORKSPACE: ProxyIdentifier =
        ProxyIdentifier::new("ExtHostWorkspace", Side::ExtensionHost);
    pub const FILE_SYSTEM_EVENTS: ProxyIdentifier =
        ProxyIdentifier::new("ExtHostFileSystemEventService", Side::ExtensionHost);
    pub const EDITOR_TABS: ProxyIdentifier =
        ProxyIdentifier::new("ExtHostEditorTabs", Side::ExtensionHost);
}

const WELL_KNOWN: [ProxyIdentifier; 6] = [
    main_thread::COMMANDS,
    main_thread::WORKSPACE,
    ext_host::COMMANDS,
    ext_host::WORKSPACE,
    ext_host::FILE_SYSTEM_EVENTS,
    ext_host::EDITOR_TABS,
];

/// Lookup table of every proxy identifier known to this process.
/// Written during setup, read on every inbound call.
#[derive(Debug, Default)]
pub struct IdentifierRegistry {
    by_name: RwLock<HashMap<&'static str, ProxyIdentifier>>,
}

impl IdentifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the identifiers both sides agree on.
    pub fn with_well_known() -> Self {
        let by_name = WELL_KNOWN.iter().map(|id| (id.name(), *id)).collect();
        Self {
            by_name: RwLock::new(by_name),
        }
    }

    pub fn register(&self, identifier: ProxyIdentifier) -> Result<()> {
        let mut by_name = self.by_name.write().unwrap_or_else(PoisonError::into_inner);
        if by_name.contains_key(identifier.name()) {
            return Err(Error::DuplicateRegistration(identifier.name().to_string()));
        }
        by_name.insert(identifier.name(), identifier);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<ProxyIdentifier> {
        self.by_name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
    }

    /// Identifiers living on `side`, sorted by name.
    pub fn on_side(&self, side: Side) -> Vec<ProxyIdentifier> {
        let mut ids: Vec<_> = self
            .by_name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|id| id.side() == side)
            .copied()
            .collect();
        ids.sort_by_key(ProxyIdentifier::name);
        ids
    }
}
