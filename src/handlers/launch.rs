//! Application launching from a configured alias map.

use std::collections::HashMap;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::action::{Action, ActionKind};
use crate::error::{Error, Result};
use crate::router::CapabilityHandler;

use super::unsupported;

/// Handles `launch_app` actions.
///
/// Applications are looked up by case-insensitive alias in a configured
/// map; the mapped command is spawned detached through the shell. Unknown
/// aliases are refused rather than guessed at.
pub struct AppLauncher {
    apps: HashMap<String, String>,
}

impl AppLauncher {
    /// Build a launcher from alias -> command pairs.
    pub fn new(apps: HashMap<String, String>) -> Self {
        let apps = apps
            .into_iter()
            .map(|(alias, command)| (alias.to_lowercase(), command))
            .collect();
        Self { apps }
    }

    /// The shell command for an alias, if configured.
    pub fn command_for(&self, app_name: &str) -> Option<&str> {
        self.apps.get(&app_name.to_lowercase()).map(String::as_str)
    }

    fn spawn(&self, app_name: &str) -> Result<String> {
        let command = self.command_for(app_name).ok_or_else(|| {
            Error::handler("launch_app", format!("unknown application: {app_name}"))
        })?;

        tracing::info!(app = %app_name, %command, "launching application");
        Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::handler("launch_app", e.to_string()))?;

        Ok(format!("launching {app_name}"))
    }
}

#[async_trait]
impl CapabilityHandler for AppLauncher {
    async fn handle(&self, action: &Action) -> Result<String> {
        match &action.kind {
            ActionKind::LaunchApp { app_name } => self.spawn(app_name),
            other => Err(unsupported(other.tag())),
        }
    }
}
