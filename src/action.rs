//! The closed action schema produced by the resolution pipeline.
//!
//! An [`Action`] is the validated output of a model turn: common fields
//! (`reason`, `is_dangerous`) plus an [`ActionKind`] discriminated by the
//! mandatory `action` tag. The enumeration is closed: adding or removing a
//! tag is a compile-time-checked change at both the schema and the router,
//! and unknown tags fail deserialization before they can reach a handler.

use serde::{Deserialize, Serialize};

/// A validated action with its common envelope fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(flatten)]
    pub kind: ActionKind,
    /// Why the model chose this action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Flag for operations that deserve confirmation.
    #[serde(default)]
    pub is_dangerous: bool,
}

impl Action {
    /// Wrap an action kind with no envelope metadata.
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            reason: None,
            is_dangerous: false,
        }
    }

    /// The `error` action every pipeline failure collapses into.
    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::Error,
            reason: Some(reason.into()),
            is_dangerous: false,
        }
    }

    /// The wire tag of this action.
    pub fn tag(&self) -> &'static str {
        self.kind.tag()
    }
}

/// Tag-specific payload of an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionKind {
    LaunchApp {
        app_name: String,
    },
    ExecuteCommand {
        command: String,
    },
    BrowserControl {
        sub_action: BrowserSubAction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    SystemControl {
        sub_action: SystemSubAction,
    },
    FileOp {
        sub_action: FileSubAction,
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        search_text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        replace_text: Option<String>,
    },
    WhatsappOp {
        sub_action: WhatsappSubAction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        contact: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    YoutubeOp {
        sub_action: YoutubeSubAction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        query: Option<String>,
    },
    TaskOp {
        sub_action: TaskSubAction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        task_id: Option<String>,
    },
    WebSearchOp {
        query: String,
    },
    WebOp {
        sub_action: WebSubAction,
        url: String,
    },
    PlannerOp {
        goal: String,
    },
    OrganizeOp {
        path: String,
        criteria: String,
    },
    CalendarOp {
        sub_action: CalendarSubAction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start_time: Option<String>,
    },
    GmailOp {
        sub_action: GmailSubAction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to_email: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subject: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<String>,
        #[serde(default = "default_gmail_max_results")]
        max_results: u32,
    },
    CodeOp {
        sub_action: CodeSubAction,
        filename: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    MemoryOp {
        sub_action: MemorySubAction,
        content: String,
    },
    ReplyOp {
        content: String,
    },
    TeachSkill {
        name: String,
        goal: String,
    },
    RunSkill {
        name: String,
    },
    ResearchOp {
        topic: String,
        #[serde(default = "default_research_depth")]
        depth: u32,
    },
    ConverterOp {
        sub_action: ConverterSubAction,
        source_paths: SourcePaths,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_filename: Option<String>,
    },
    Error,
}

fn default_gmail_max_results() -> u32 {
    5
}

fn default_research_depth() -> u32 {
    3
}

impl ActionKind {
    /// Every valid wire tag, in schema order. Injected into the system
    /// prompt and into correction prompts.
    pub const VALID_TAGS: [&'static str; 22] = [
        "launch_app",
        "execute_command",
        "browser_control",
        "system_control",
        "file_op",
        "whatsapp_op",
        "youtube_op",
        "task_op",
        "web_search_op",
        "web_op",
        "planner_op",
        "organize_op",
        "calendar_op",
        "gmail_op",
        "code_op",
        "memory_op",
        "reply_op",
        "teach_skill",
        "run_skill",
        "research_op",
        "converter_op",
        "error",
    ];

    /// One-line field summary per tag, for prompt construction. Kept in
    /// schema order next to `VALID_TAGS`.
    pub const TAG_HELP: [(&'static str, &'static str); 22] = [
        ("launch_app", "open an application; fields: app_name"),
        ("execute_command", "run a shell command; fields: command"),
        (
            "browser_control",
            "fields: sub_action (new_tab|close_tab|next_tab|prev_tab|go_to_url), url?",
        ),
        (
            "system_control",
            "fields: sub_action (volume_up|volume_down|mute|play_pause|media_next|media_prev|screenshot|list_processes)",
        ),
        (
            "file_op",
            "fields: sub_action (read|write|list|patch), path, content?, search_text?, replace_text?",
        ),
        (
            "whatsapp_op",
            "fields: sub_action (monitor|send|stop), contact?, message?",
        ),
        (
            "youtube_op",
            "fields: sub_action (play|pause|next|mute|vol_up|vol_down), query?",
        ),
        ("task_op", "fields: sub_action (list|stop), task_id?"),
        ("web_search_op", "search the web; fields: query"),
        ("web_op", "fields: sub_action (scrape|screenshot), url"),
        ("planner_op", "break a goal into steps; fields: goal"),
        ("organize_op", "tidy a directory; fields: path, criteria"),
        (
            "calendar_op",
            "fields: sub_action (list|create), summary?, start_time?",
        ),
        (
            "gmail_op",
            "fields: sub_action (list|send), to_email?, subject?, body?, max_results?",
        ),
        (
            "code_op",
            "fields: sub_action (write|execute), filename, content?",
        ),
        (
            "memory_op",
            "fields: sub_action (memorize|forget), content",
        ),
        ("reply_op", "answer in conversation; fields: content"),
        ("teach_skill", "fields: name, goal"),
        ("run_skill", "fields: name"),
        ("research_op", "fields: topic, depth?"),
        (
            "converter_op",
            "fields: sub_action (images_to_pdf|docx_to_pdf), source_paths, output_filename?",
        ),
        ("error", "request cannot be acted on; explain in reason"),
    ];

    /// The wire tag of this kind.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::LaunchApp { .. } => "launch_app",
            Self::ExecuteCommand { .. } => "execute_command",
            Self::BrowserControl { .. } => "browser_control",
            Self::SystemControl { .. } => "system_control",
            Self::FileOp { .. } => "file_op",
            Self::WhatsappOp { .. } => "whatsapp_op",
            Self::YoutubeOp { .. } => "youtube_op",
            Self::TaskOp { .. } => "task_op",
            Self::WebSearchOp { .. } => "web_search_op",
            Self::WebOp { .. } => "web_op",
            Self::PlannerOp { .. } => "planner_op",
            Self::OrganizeOp { .. } => "organize_op",
            Self::CalendarOp { .. } => "calendar_op",
            Self::GmailOp { .. } => "gmail_op",
            Self::CodeOp { .. } => "code_op",
            Self::MemoryOp { .. } => "memory_op",
            Self::ReplyOp { .. } => "reply_op",
            Self::TeachSkill { .. } => "teach_skill",
            Self::RunSkill { .. } => "run_skill",
            Self::ResearchOp { .. } => "research_op",
            Self::ConverterOp { .. } => "converter_op",
            Self::Error => "error",
        }
    }
}

/// Browser tab operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserSubAction {
    NewTab,
    CloseTab,
    NextTab,
    PrevTab,
    GoToUrl,
}

/// OS-level controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemSubAction {
    VolumeUp,
    VolumeDown,
    Mute,
    PlayPause,
    MediaNext,
    MediaPrev,
    Screenshot,
    ListProcesses,
}

/// File operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileSubAction {
    Read,
    Write,
    List,
    Patch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhatsappSubAction {
    Monitor,
    Send,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YoutubeSubAction {
    Play,
    Pause,
    Next,
    Mute,
    VolUp,
    VolDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSubAction {
    List,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebSubAction {
    Scrape,
    Screenshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarSubAction {
    List,
    Create,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GmailSubAction {
    List,
    Send,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeSubAction {
    Write,
    Execute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemorySubAction {
    Memorize,
    Forget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConverterSubAction {
    ImagesToPdf,
    DocxToPdf,
}

/// Converter input: models emit either a single path or a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourcePaths {
    One(String),
    Many(Vec<String>),
}

impl SourcePaths {
    /// Normalize to a list, splitting comma-separated single strings.
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) if s.contains(',') => {
                s.split(',').map(|p| p.trim().to_string()).collect()
            }
            Self::One(s) => vec![s],
            Self::Many(v) => v,
        }
    }
}
