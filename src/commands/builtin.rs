//! Commands the host always provides.

use std::sync::Arc;

use serde_json::Value;

use super::{Command, CommandRegistry};
use crate::{error::Result, workspace::WorkspaceManager};

pub const PING: &str = "bridge.ping";
pub const VERSION: &str = "bridge.version";
pub const ABOUT: &str = "bridge.about";
pub const LIST_WORKSPACES: &str = "bridge.listWorkspaces";

pub fn register_builtins(registry: &CommandRegistry, workspaces: &Arc<WorkspaceManager>) {
    registry.register(
        Command::new(PING, |_: &[Value]| -> Result<Value> { Ok(Value::from("pong")) })
            .with_return_type_hint("string"),
    );

    registry.register(
        Command::new(VERSION, |_: &[Value]| -> Result<Value> {
            Ok(Value::from(env!("CARGO_PKG_VERSION")))
        })
        .with_return_type_hint("string"),
    );
    registry.register_alias(VERSION, ABOUT);

    let workspaces = Arc::downgrade(workspaces);
    registry.register(
        Command::new(LIST_WORKSPACES, move |_: &[Value]| -> Result<Value> {
            let ids = workspaces
                .upgrade()
                .map(|manager| manager.ids())
                .unwrap_or_default();
            Ok(Value::from(ids))
        })
        .with_return_type_hint("string[]"),
    );
}
