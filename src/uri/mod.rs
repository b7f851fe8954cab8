//! Resource identifiers and their translation across the process boundary.
//!
//! The host addresses files with the native `file` scheme while the extension
//! host sees them under a remote scheme tagged with the remote authority:
//!
//! ```text
//!            outgoing                          incoming
//! file:///a  ───────▶  vscode-remote://auth/a  ───────▶  file:///a
//! vscode-local:/b ──▶  file:/b                 ───────▶  vscode-local:/b
//! ```

mod parts;
mod transformer;

pub use parts::{UriComponents, UriParts, URI_MARKER};
pub use transformer::{
    Direction, UriTransformer, NATIVE_SCHEME, REMOTE_SCHEME, SHADOW_LOCAL_SCHEME,
};
