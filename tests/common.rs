#![allow(dead_code)]

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use serde_json::Value;
use tempfile::TempDir;

pub const REMOTE_AUTHORITY: &str = "test-remote";

/// Runs `exthost-bridge serve` on a private socket and connects to it as the
/// extension host.
pub struct BridgeHarness {
    child: Option<Child>,
    stream: UnixStream,
    reader: BufReader<UnixStream>,
    workspace: TempDir,
    _socket_dir: TempDir,
}

impl BridgeHarness {
    pub fn spawn() -> Self {
        let socket_dir = TempDir::new().expect("Failed to create socket dir");
        let workspace = TempDir::new().expect("Failed to create workspace dir");
        let socket = socket_dir.path().join("bridge.sock");

        let child = Command::new(env!("CARGO_BIN_EXE_exthost-bridge"))
            .arg("serve")
            .arg("--socket")
            .arg(&socket)
            .arg("--workspace")
            .arg(workspace.path())
            .args(["--id", "e2e", "--remote-authority", REMOTE_AUTHORITY])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("Failed to spawn exthost-bridge");

        let stream = connect(&socket, Duration::from_secs(10));
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("Failed to set read timeout");
        let reader = BufReader::new(stream.try_clone().expect("Failed to clone stream"));

        Self {
            child: Some(child),
            stream,
            reader,
            workspace,
            _socket_dir: socket_dir,
        }
    }

    pub fn workspace_path(&self) -> PathBuf {
        self.workspace.path().to_path_buf()
    }

    pub fn send(&mut self, frame: &Value) -> std::io::Result<()> {
        let line = format!("{frame}\n");
        self.stream.write_all(line.as_bytes())?;
        self.stream.flush()
    }

    /// Next frame from the host, or `None` on timeout or EOF.
    pub fn read_frame(&mut self) -> Option<Value> {
        loop {
            let mut line = String::new();
            let read = self.reader.read_line(&mut line).ok()?;
            if read == 0 {
                return None;
            }
            if !line.trim().is_empty() {
                return serde_json::from_str(&line).ok();
            }
        }
    }

    /// Read frames until one matches, giving up after `timeout`.
    pub fn wait_for(&mut self, timeout: Duration, matches: impl Fn(&Value) -> bool) -> Option<Value> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Some(frame) = self.read_frame() {
                if matches(&frame) {
                    return Some(frame);
                }
            }
        }
        None
    }

    pub fn wait_for_request(&mut self, target: &str, method: &str) -> Option<Value> {
        self.wait_for(Duration::from_secs(10), |frame| {
            frame["type"] == "request" && frame["target"] == target && frame["method"] == method
        })
    }
}

fn connect(socket: &Path, timeout: Duration) -> UnixStream {
    let deadline = Instant::now() + timeout;
    loop {
        match UnixStream::connect(socket) {
            Ok(stream) => return stream,
            Err(e) => {
                assert!(Instant::now() < deadline, "Bridge never listened: {e}");
                std::thread::sleep(Duration::from_millis(50));
            }
        }
    }
}

impl Drop for BridgeHarness {
    fn drop(&mut self) {
        if let Some(ref mut child) = self.child {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
