//! Named actions, invoked locally or across the bridge.

pub mod builtin;
mod executor;
mod registry;

pub use executor::{CommandExecutor, CommandsService};
pub use registry::{Command, CommandRegistry, Invocable};
