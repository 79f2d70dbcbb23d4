//! Shell command execution with a security gate and a hard timeout.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::action::{Action, ActionKind};
use crate::error::{Error, Result};
use crate::router::CapabilityHandler;

use super::unsupported;

/// Commands are killed after this many seconds by default.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;

/// Executes `execute_command` actions through the system shell.
///
/// Commands matching any blocked pattern are refused before they reach the
/// shell. Patterns are matched as case-insensitive substrings; the
/// defaults cover the classic destructive one-liners.
pub struct CommandExecutor {
    timeout: Duration,
    blocked_patterns: Vec<String>,
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
            default_blocked_patterns(),
        )
    }
}

/// Patterns refused out of the box.
pub fn default_blocked_patterns() -> Vec<String> {
    ["rm -rf /", "mkfs", ":(){", "dd if=", "> /dev/sda"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl CommandExecutor {
    pub fn new(timeout: Duration, blocked_patterns: Vec<String>) -> Self {
        Self {
            timeout,
            blocked_patterns: blocked_patterns
                .into_iter()
                .map(|p| p.to_lowercase())
                .collect(),
        }
    }

    /// Whether the security gate refuses this command.
    pub fn is_blocked(&self, command: &str) -> bool {
        let lower = command.to_lowercase();
        self.blocked_patterns.iter().any(|p| lower.contains(p))
    }

    async fn run(&self, command: &str) -> Result<String> {
        if self.is_blocked(command) {
            tracing::warn!(%command, "command refused by security policy");
            return Err(Error::handler(
                "execute_command",
                "command blocked by security policy",
            ));
        }

        tracing::info!(%command, "executing shell command");
        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                Error::handler(
                    "execute_command",
                    format!("timed out after {}s", self.timeout.as_secs()),
                )
            })?
            .map_err(|e| Error::handler("execute_command", e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if output.status.success() {
            if stdout.is_empty() {
                Ok("command completed with no output".to_string())
            } else {
                Ok(stdout)
            }
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let detail = if stderr.is_empty() { stdout } else { stderr };
            Err(Error::handler(
                "execute_command",
                format!("{} ({detail})", output.status),
            ))
        }
    }
}

#[async_trait]
impl CapabilityHandler for CommandExecutor {
    async fn handle(&self, action: &Action) -> Result<String> {
        match &action.kind {
            ActionKind::ExecuteCommand { command } => self.run(command).await,
            other => Err(unsupported(other.tag())),
        }
    }
}
