//! Multi-provider LLM backend with credential rotation and failover.
//!
//! ## Example
//!
//! ```rust,ignore
//! use aide_core::llm::{
//!     CredentialRotator, HttpClientFactory, Provider, RequestDispatcher,
//!     ChatMessage, CompletionRequest,
//! };
//!
//! let mut rotator = CredentialRotator::new();
//! rotator.add_provider(Provider::Groq, "llama-3.3-70b-versatile", keys);
//!
//! let mut dispatcher = RequestDispatcher::new(
//!     rotator,
//!     vec![Provider::Groq, Provider::OpenAI],
//!     Box::new(HttpClientFactory::default()),
//!     6,
//! )?;
//!
//! let request = CompletionRequest::new(vec![ChatMessage::user("hello")]);
//! let text = dispatcher.request_completion(&request).await?;
//! ```

mod client;
mod dispatch;
mod rotation;
mod types;

pub use client::{
    ClientConfig, ClientFactory, CompletionClient, GeminiClient, HttpClientFactory,
    OpenAiCompatClient,
};
pub use dispatch::RequestDispatcher;
pub use rotation::{CredentialRotator, ProviderState};
pub use types::{ChatMessage, ChatRole, CompletionRequest, Provider};
