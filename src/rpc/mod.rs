//! Cross-process calls between the host and the extension host.
//!
//! ```text
//!  Proxy ──call──▶ RpcEngine ──Envelope──▶ channel ──▶ RpcEngine ──▶ RpcService
//!    ▲                 │ pending[id]                      │ worker per target
//!    └──── outcome ────┘◀──────────── response/error ─────┘
//! ```

mod channel;
mod engine;
mod identifier;
mod marshal;
mod protocol;
mod proxy;

pub use channel::{spawn_channel, ChannelReceiver, ChannelSender};
pub use engine::{RpcEngine, RpcService};
pub use identifier::{ext_host, main_thread, IdentifierRegistry, ProxyIdentifier, Side};
pub use marshal::{is_uri_key, rewrite_uris};
pub use protocol::{arg, to_value, Envelope};
pub use proxy::{
    methods, ExtHostCommands, ExtHostEditorTabs, ExtHostFileSystemEvents, ExtHostWorkspace,
    MainThreadCommands, MainThreadWorkspace, Proxy,
};
