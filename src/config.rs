//! Runtime configuration shared by both ends of the bridge.

use std::{path::PathBuf, time::Duration};

use clap::Args;

pub const DEFAULT_REMOTE_AUTHORITY: &str = "localhost";
pub const DEFAULT_STREAM_CAPACITY: usize = 64;
pub const DEFAULT_BATCH_WINDOW: Duration = Duration::from_millis(50);
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Returns the default path of the bridge's Unix socket.
pub fn default_socket_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("exthost-bridge/bridge.sock")
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Authority stamped on identifiers handed to the extension host.
    pub remote_authority: String,
    pub socket_path: PathBuf,
    /// Buffer size of every event bus broadcast stream.
    pub stream_capacity: usize,
    /// How long raw filesystem notifications are gathered into one batch.
    pub batch_window: Duration,
    pub reconnect_delay: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            remote_authority: DEFAULT_REMOTE_AUTHORITY.to_string(),
            socket_path: default_socket_path(),
            stream_capacity: DEFAULT_STREAM_CAPACITY,
            batch_window: DEFAULT_BATCH_WINDOW,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// Command-line flags shared by `serve` and `exthost`.
#[derive(Debug, Clone, Args)]
pub struct BridgeArgs {
    /// Unix socket connecting the host and the extension host
    #[arg(long, env = "EXTHOST_BRIDGE_SOCKET")]
    pub socket: Option<PathBuf>,
    /// Remote authority used when translating resource identifiers
    #[arg(long, env = "EXTHOST_BRIDGE_AUTHORITY", default_value = DEFAULT_REMOTE_AUTHORITY)]
    pub remote_authority: String,
    /// Capacity of event bus broadcast streams
    #[arg(long, default_value_t = DEFAULT_STREAM_CAPACITY)]
    pub stream_capacity: usize,
    /// Filesystem batching window in milliseconds
    #[arg(long, default_value_t = 50)]
    pub batch_window_ms: u64,
    /// Delay between reconnection attempts in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub reconnect_delay_ms: u64,
}

impl From<BridgeArgs> for BridgeConfig {
    fn from(args: BridgeArgs) -> Self {
        Self {
            remote_authority: args.remote_authority,
            socket_path: args.socket.unwrap_or_else(default_socket_path),
            stream_capacity: args.stream_capacity.max(1),
            batch_window: Duration::from_millis(args.batch_window_ms),
            reconnect_delay: Duration::from_millis(args.reconnect_delay_ms),
        }
    }
}
