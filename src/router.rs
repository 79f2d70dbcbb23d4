//! Routing validated actions to effect handlers.
//!
//! The router owns a [`Capabilities`] registry: one optional handler slot
//! per action family. A populated slot receives the action; an empty slot
//! yields a polite "capability not configured" message instead of an
//! error. Handler failures never escape the router; they are rendered as
//! `[ERROR] <tag>: <message>` so one bad effect cannot take down the
//! session loop.
//!
//! `reply_op` and `error` are terminal actions handled inline: the first
//! surfaces the model's text, the second surfaces the failure reason.

use std::sync::Arc;

use async_trait::async_trait;

use crate::action::{Action, ActionKind};
use crate::error::Result;

/// An effect handler for one action family.
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    /// Execute the action and return user-facing text.
    async fn handle(&self, action: &Action) -> Result<String>;
}

/// Destination for routed output.
pub trait OutputSink: Send {
    fn emit(&mut self, text: &str);
}

/// Writes routed output to stdout.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn emit(&mut self, text: &str) {
        println!("{text}");
    }
}

/// Collects routed output in memory.
#[derive(Debug, Default)]
pub struct BufferSink {
    pub lines: Vec<String>,
}

impl OutputSink for BufferSink {
    fn emit(&mut self, text: &str) {
        self.lines.push(text.to_string());
    }
}

type Slot = Option<Arc<dyn CapabilityHandler>>;

/// Handler registry with one slot per action family. Every slot defaults
/// to empty; hosts populate only the capabilities they ship.
#[derive(Default)]
pub struct Capabilities {
    pub launcher: Slot,
    pub executor: Slot,
    pub browser: Slot,
    pub system: Slot,
    pub files: Slot,
    pub whatsapp: Slot,
    pub youtube: Slot,
    pub tasks: Slot,
    pub web_search: Slot,
    pub web: Slot,
    pub planner: Slot,
    pub organizer: Slot,
    pub calendar: Slot,
    pub gmail: Slot,
    pub code: Slot,
    pub memory: Slot,
    pub skills: Slot,
    pub research: Slot,
    pub converter: Slot,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// The slot responsible for this action kind. Terminal kinds
    /// (`reply_op`, `error`) have no slot.
    fn slot(&self, kind: &ActionKind) -> Option<&Arc<dyn CapabilityHandler>> {
        match kind {
            ActionKind::LaunchApp { .. } => self.launcher.as_ref(),
            ActionKind::ExecuteCommand { .. } => self.executor.as_ref(),
            ActionKind::BrowserControl { .. } => self.browser.as_ref(),
            ActionKind::SystemControl { .. } => self.system.as_ref(),
            ActionKind::FileOp { .. } => self.files.as_ref(),
            ActionKind::WhatsappOp { .. } => self.whatsapp.as_ref(),
            ActionKind::YoutubeOp { .. } => self.youtube.as_ref(),
            ActionKind::TaskOp { .. } => self.tasks.as_ref(),
            ActionKind::WebSearchOp { .. } => self.web_search.as_ref(),
            ActionKind::WebOp { .. } => self.web.as_ref(),
            ActionKind::PlannerOp { .. } => self.planner.as_ref(),
            ActionKind::OrganizeOp { .. } => self.organizer.as_ref(),
            ActionKind::CalendarOp { .. } => self.calendar.as_ref(),
            ActionKind::GmailOp { .. } => self.gmail.as_ref(),
            ActionKind::CodeOp { .. } => self.code.as_ref(),
            ActionKind::MemoryOp { .. } => self.memory.as_ref(),
            ActionKind::TeachSkill { .. } | ActionKind::RunSkill { .. } => self.skills.as_ref(),
            ActionKind::ResearchOp { .. } => self.research.as_ref(),
            ActionKind::ConverterOp { .. } => self.converter.as_ref(),
            ActionKind::ReplyOp { .. } | ActionKind::Error => None,
        }
    }
}

/// Dispatches validated actions to their handlers.
pub struct ActionRouter {
    capabilities: Capabilities,
    /// When set, dangerous actions are blocked instead of executed.
    safe_mode: bool,
}

impl ActionRouter {
    pub fn new(capabilities: Capabilities, safe_mode: bool) -> Self {
        Self {
            capabilities,
            safe_mode,
        }
    }

    /// Route one action, emit the outcome through the sink, and return it.
    pub async fn route_to(&self, action: &Action, sink: &mut dyn OutputSink) -> String {
        let outcome = self.route(action).await;
        sink.emit(&outcome);
        outcome
    }

    /// Route one action and return the user-facing outcome text.
    ///
    /// Infallible: handler failures are contained as `[ERROR]` lines.
    pub async fn route(&self, action: &Action) -> String {
        let tag = action.tag();

        match &action.kind {
            ActionKind::ReplyOp { content } => return content.clone(),
            ActionKind::Error => {
                let reason = action
                    .reason
                    .as_deref()
                    .unwrap_or("something went wrong");
                return format!("[ERROR] {reason}");
            }
            _ => {}
        }

        if self.safe_mode && action.is_dangerous {
            tracing::warn!(%tag, "dangerous action blocked by safe mode");
            return format!("[BLOCKED] {tag}: dangerous action requires confirmation");
        }

        match self.capabilities.slot(&action.kind) {
            Some(handler) => match handler.handle(action).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(%tag, error = %e, "handler failed");
                    format!("[ERROR] {tag}: {e}")
                }
            },
            None => {
                tracing::debug!(%tag, "capability not configured");
                format!("[DISABLED] {tag}: capability not configured")
            }
        }
    }
}
