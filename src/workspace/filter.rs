//! Noise that never leaves the aggregator.

use std::path::{Component, Path};

use super::ItemKind;

/// Suffixes editors and build tools use for scratch copies of files.
pub const TRANSIENT_SUFFIXES: [&str; 7] = [
    "~",
    ".tmp",
    ".swp",
    ".swx",
    ".bak",
    "___jb_tmp___",
    "___jb_old___",
];

/// Whether the item or any segment of its path below `root` is hidden.
/// Without a root every segment counts.
pub fn is_hidden(root: Option<&Path>, path: &Path) -> bool {
    let relative = root.map_or(path, |root| path.strip_prefix(root).unwrap_or(path));
    relative.components().any(|component| match component {
        Component::Normal(segment) => segment.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

pub fn is_transient(path: &Path) -> bool {
    path.file_name().is_some_and(|name| {
        let name = name.to_string_lossy();
        TRANSIENT_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
    })
}

/// Transient suffixes only apply to files.
pub fn is_ignored(root: Option<&Path>, path: &Path, item_kind: ItemKind) -> bool {
    is_hidden(root, path) || (item_kind == ItemKind::File && is_transient(path))
}
