//! Registry for long-running background tasks.
//!
//! Monitors and other long-lived effects run as tokio tasks registered
//! here. Each task receives a watch channel it is expected to poll for a
//! cooperative stop signal. Stopping a task signals the channel and waits
//! a grace period for the task to wind down; tasks that keep running past
//! the grace period are aborted and reported as force-stopped.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::action::{Action, ActionKind, TaskSubAction};
use crate::error::{Error, Result};
use crate::router::CapabilityHandler;

/// Grace period a stopping task gets before it is aborted.
pub const DEFAULT_STOP_GRACE_SECS: u64 = 5;

/// How a task ended when stopped through the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The task observed the stop signal and finished within the grace
    /// period.
    Stopped,
    /// The task ignored the stop signal and was aborted.
    ForceStopped,
}

/// Snapshot of a registered task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskInfo {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

struct TaskEntry {
    info: TaskInfo,
    stop: watch::Sender<bool>,
    join: JoinHandle<()>,
}

/// Owns every running background task.
pub struct TaskRegistry {
    tasks: HashMap<Uuid, TaskEntry>,
    stop_grace: Duration,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
            stop_grace: Duration::from_secs(DEFAULT_STOP_GRACE_SECS),
        }
    }

    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Spawn and register a task. The closure receives the stop receiver;
    /// the task should exit promptly once it reads `true`.
    pub fn spawn<F, Fut>(&mut self, name: impl Into<String>, task: F) -> Uuid
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop, stop_rx) = watch::channel(false);
        let info = TaskInfo {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: Utc::now(),
        };
        let id = info.id;

        tracing::info!(%id, name = %info.name, "background task started");
        let join = tokio::spawn(task(stop_rx));
        self.tasks.insert(id, TaskEntry { info, stop, join });
        id
    }

    /// Running tasks, oldest first. Entries whose task already finished on
    /// its own are pruned.
    pub fn list(&mut self) -> Vec<TaskInfo> {
        self.tasks.retain(|_, entry| !entry.join.is_finished());

        let mut infos: Vec<TaskInfo> = self.tasks.values().map(|e| e.info.clone()).collect();
        infos.sort_by_key(|info| info.created_at);
        infos
    }

    /// Signal a task to stop and wait out the grace period.
    pub async fn stop(&mut self, id: Uuid) -> Result<StopOutcome> {
        let entry = self
            .tasks
            .remove(&id)
            .ok_or_else(|| Error::handler("task_op", format!("no such task: {id}")))?;

        // Receiver may already be gone if the task finished on its own.
        let _ = entry.stop.send(true);

        let abort = entry.join.abort_handle();
        match tokio::time::timeout(self.stop_grace, entry.join).await {
            Ok(_) => {
                tracing::info!(%id, "background task stopped");
                Ok(StopOutcome::Stopped)
            }
            Err(_) => {
                tracing::warn!(%id, "background task ignored stop signal, aborting");
                abort.abort();
                Ok(StopOutcome::ForceStopped)
            }
        }
    }

    /// Stop every registered task.
    pub async fn stop_all(&mut self) -> Vec<(Uuid, StopOutcome)> {
        let ids: Vec<Uuid> = self.tasks.keys().copied().collect();
        let mut outcomes = Vec::with_capacity(ids.len());
        for id in ids {
            if let Ok(outcome) = self.stop(id).await {
                outcomes.push((id, outcome));
            }
        }
        outcomes
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Drop for TaskRegistry {
    fn drop(&mut self) {
        for entry in self.tasks.values() {
            entry.join.abort();
        }
    }
}

/// Routes `task_op` actions to a shared registry.
pub struct TaskOpHandler {
    registry: Arc<Mutex<TaskRegistry>>,
}

impl TaskOpHandler {
    pub fn new(registry: Arc<Mutex<TaskRegistry>>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl CapabilityHandler for TaskOpHandler {
    async fn handle(&self, action: &Action) -> Result<String> {
        let ActionKind::TaskOp {
            sub_action,
            task_id,
        } = &action.kind
        else {
            return Err(crate::handlers::unsupported(action.tag()));
        };

        match sub_action {
            TaskSubAction::List => {
                let tasks = self.registry.lock().await.list();
                if tasks.is_empty() {
                    return Ok("no background tasks running".to_string());
                }
                let lines: Vec<String> = tasks
                    .iter()
                    .map(|t| {
                        format!(
                            "{}  {}  started {}",
                            t.id,
                            t.name,
                            t.created_at.format("%Y-%m-%d %H:%M:%S UTC")
                        )
                    })
                    .collect();
                Ok(lines.join("\n"))
            }
            TaskSubAction::Stop => {
                let id = task_id
                    .as_deref()
                    .ok_or_else(|| Error::handler("task_op", "stop requires a task_id"))?;
                let id = Uuid::parse_str(id)
                    .map_err(|_| Error::handler("task_op", format!("invalid task id: {id}")))?;

                match self.registry.lock().await.stop(id).await? {
                    StopOutcome::Stopped => Ok(format!("stopped task {id}")),
                    StopOutcome::ForceStopped => Ok(format!("force-stopped task {id}")),
                }
            }
        }
    }
}
