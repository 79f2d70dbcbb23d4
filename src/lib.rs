//! # aide-core
//!
//! An action-resolution pipeline for natural-language assistants: free
//! text in, a validated typed action out, routed to an effect handler.
//!
//! ## Core Components
//!
//! - **llm**: Multi-provider completion backend with credential rotation
//!   and provider failover
//! - **action**: The closed, serde-validated action schema
//! - **resolve**: JSON extraction, schema validation, and bounded
//!   self-correction
//! - **router**: Capability registry and exhaustive action dispatch
//! - **handlers**: Built-in effect handlers (shell, files, app launching)
//! - **tasks**: Registry for long-running background tasks
//!
//! ## Example
//!
//! ```rust,ignore
//! use aide_core::{Capabilities, Pipeline, PipelineConfig};
//!
//! let mut config = PipelineConfig::from_json(&std::fs::read_to_string("config.json")?)?;
//! config.apply_env_keys();
//!
//! let mut pipeline = Pipeline::new(config, Capabilities::new())?;
//! let outcome = pipeline.process("open firefox").await;
//! println!("{outcome}");
//! ```

pub mod action;
pub mod config;
pub mod error;
pub mod handlers;
pub mod history;
pub mod llm;
pub mod pipeline;
pub mod resolve;
pub mod router;
pub mod tasks;

// Re-exports for convenience
pub use action::{Action, ActionKind, FileSubAction, SourcePaths};
pub use config::{PipelineConfig, ProviderConfig, SecurityConfig, SecurityLevel};
pub use error::{Error, ProviderError, Result};
pub use handlers::{builtin_capabilities, AppLauncher, CommandExecutor, FileManager};
pub use history::ConversationHistory;
pub use llm::{
    ChatMessage, ChatRole, ClientFactory, CompletionClient, CompletionRequest, CredentialRotator,
    HttpClientFactory, Provider, RequestDispatcher,
};
pub use pipeline::Pipeline;
pub use resolve::ActionResolver;
pub use router::{ActionRouter, BufferSink, Capabilities, CapabilityHandler, OutputSink, StdoutSink};
pub use tasks::{StopOutcome, TaskInfo, TaskOpHandler, TaskRegistry};
