mod common;

use std::time::Duration;

use common::{BridgeHarness, REMOTE_AUTHORITY};
use serde_json::json;

#[test]
fn test_workspace_snapshot_uses_remote_identifiers() {
    let mut harness = BridgeHarness::spawn();

    let request = harness
        .wait_for_request("ExtHostWorkspace", "$initializeWorkspace")
        .expect("No workspace snapshot");

    let data = &request["args"][0];
    assert_eq!(data["id"], "e2e");
    let folder = &data["folders"][0]["uri"];
    assert_eq!(folder["$mid"], 1);
    assert_eq!(folder["scheme"], "vscode-remote");
    assert_eq!(folder["authority"], REMOTE_AUTHORITY);
}

#[test]
fn test_extension_host_runs_host_command() {
    let mut harness = BridgeHarness::spawn();

    harness
        .send(&json!({
            "type": "request",
            "id": 1,
            "target": "MainThreadCommands",
            "method": "$executeCommand",
            "args": ["bridge.ping", []],
        }))
        .unwrap();

    let response = harness
        .wait_for(Duration::from_secs(10), |frame| {
            frame["type"] != "request" && frame["id"] == 1
        })
        .expect("No response to $executeCommand");
    assert_eq!(response["type"], "response");
    assert_eq!(response["result"], "pong");
}

#[test]
fn test_unknown_target_gets_error_reply() {
    let mut harness = BridgeHarness::spawn();

    harness
        .send(&json!({
            "type": "request",
            "id": 7,
            "target": "MainThreadNothing",
            "method": "$anything",
        }))
        .unwrap();

    let reply = harness
        .wait_for(Duration::from_secs(10), |frame| {
            frame["type"] != "request" && frame["id"] == 7
        })
        .expect("No error reply");
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["error"]["kind"], "unresolvedProxy");
}

#[test]
fn test_created_file_reaches_extension_host() {
    let mut harness = BridgeHarness::spawn();
    harness
        .wait_for_request("ExtHostWorkspace", "$initializeWorkspace")
        .expect("No workspace snapshot");

    std::fs::write(harness.workspace_path().join("notes.txt"), "hello").unwrap();

    let request = harness
        .wait_for_request("ExtHostFileSystemEventService", "$onFileEvent")
        .expect("No file event");
    let payload = &request["args"][0];
    assert_eq!(payload["session"], "e2e");
    let touched: Vec<_> = ["created", "changed"]
        .iter()
        .filter_map(|key| payload[key].as_array())
        .flatten()
        .collect();
    let uri = touched
        .iter()
        .find(|uri| uri["path"].as_str().is_some_and(|p| p.ends_with("/notes.txt")))
        .expect("notes.txt missing from file event");
    assert_eq!(uri["scheme"], "vscode-remote");
    assert_eq!(uri["authority"], REMOTE_AUTHORITY);
}
