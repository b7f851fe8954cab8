//! Bridge between an IDE host process and an out-of-process extension host.
//!
//! The two sides talk over one newline-delimited JSON channel. Each side
//! registers services under well-known identifiers ([`rpc`]) and calls the
//! other side through typed proxies. Resource identifiers crossing the
//! channel are rewritten between the host's `file` namespace and the
//! extension host's `vscode-remote` namespace ([`uri`]).
//!
//! [`host::run`] and [`exthost::run`] are the two ends the binary starts.

pub mod app;
pub mod bus;
pub mod commands;
pub mod config;
pub mod error;
pub mod exthost;
pub mod host;
pub mod rpc;
pub mod uri;
pub mod workspace;

pub use error::{Error, Result};
