//! Built-in effect handlers.
//!
//! These are the capabilities the crate ships ready to plug into a
//! [`Capabilities`](crate::router::Capabilities) registry: shell command
//! execution, file operations, and application launching. Every other
//! action family is routed through the same
//! [`CapabilityHandler`](crate::router::CapabilityHandler) trait, so hosts
//! can supply their own implementations for the slots this crate leaves
//! empty.

mod exec;
mod files;
mod launch;

pub use exec::{default_blocked_patterns, CommandExecutor, DEFAULT_COMMAND_TIMEOUT_SECS};
pub use files::FileManager;
pub use launch::AppLauncher;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::config::PipelineConfig;
use crate::router::Capabilities;
use crate::tasks::{TaskOpHandler, TaskRegistry};

/// Capabilities populated with every handler this crate ships: shell
/// execution, file operations, app launching, and task control. Hosts add
/// their own handlers on top.
pub fn builtin_capabilities(
    config: &PipelineConfig,
    tasks: Arc<Mutex<TaskRegistry>>,
) -> Capabilities {
    let mut capabilities = Capabilities::new();
    capabilities.executor = Some(Arc::new(CommandExecutor::new(
        Duration::from_secs(config.command_timeout_secs),
        config.security.effective_blocked_commands(),
    )));
    capabilities.files = Some(Arc::new(FileManager::new()));
    capabilities.launcher = Some(Arc::new(AppLauncher::new(config.apps.clone())));
    capabilities.tasks = Some(Arc::new(TaskOpHandler::new(tasks)));
    capabilities
}

/// Error for an action kind a handler does not own. The router's
/// exhaustive match makes this unreachable in practice, but handlers stay
/// total.
pub(crate) fn unsupported(tag: &str) -> crate::error::Error {
    crate::error::Error::handler(tag, "unsupported action for this handler")
}
