//! Provider adapter trait and vendor implementations.
//!
//! Adapters differ only in transport details. Groq, OpenAI, and DeepSeek all
//! speak the OpenAI chat-completions dialect and share one adapter
//! parameterized by base URL; Gemini gets its own encoding (role `model`,
//! `systemInstruction`, `responseMimeType` for JSON mode). Every adapter
//! normalizes failures into [`ProviderError`] at this boundary.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

use super::types::{ChatMessage, ChatRole, CompletionRequest, Provider};

/// A single vendor's completion call.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Complete a prompt, returning raw model text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;

    /// The provider this adapter talks to.
    fn provider(&self) -> Provider;
}

/// Builds adapters for (provider, credential, model) triples.
///
/// The dispatcher re-initializes its adapter through this seam whenever the
/// active credential or provider changes; tests inject scripted fakes.
pub trait ClientFactory: Send + Sync {
    fn build(
        &self,
        provider: Provider,
        credential: &str,
        model: &str,
    ) -> Box<dyn CompletionClient>;
}

/// Transport configuration shared by the HTTP adapters.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API key.
    pub api_key: String,
    /// Model name.
    pub model: String,
    /// Base URL override.
    pub base_url: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            timeout_secs: 120,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

fn build_http_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| Client::new())
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    ProviderError::Network(format!("HTTP request failed: {e}"))
}

/// Adapter for providers speaking the OpenAI chat-completions dialect
/// (OpenAI itself, Groq, DeepSeek).
pub struct OpenAiCompatClient {
    provider: Provider,
    config: ClientConfig,
    http: Client,
}

impl OpenAiCompatClient {
    pub fn new(provider: Provider, config: ClientConfig) -> Self {
        let http = build_http_client(config.timeout_secs);
        Self {
            provider,
            config,
            http,
        }
    }

    fn base_url(&self) -> Result<&str, ProviderError> {
        if let Some(url) = self.config.base_url.as_deref() {
            return Ok(url);
        }
        match self.provider {
            Provider::OpenAI => Ok("https://api.openai.com/v1"),
            Provider::Groq => Ok("https://api.groq.com/openai/v1"),
            Provider::DeepSeek => Ok("https://api.deepseek.com/v1"),
            Provider::Gemini => Err(ProviderError::Network(
                "gemini does not speak the OpenAI dialect; use GeminiClient".to_string(),
            )),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    temperature: f64,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

impl WireMessage {
    fn from_chat(m: &ChatMessage) -> Self {
        Self {
            role: match m.role {
                ChatRole::System => "system".to_string(),
                ChatRole::User => "user".to_string(),
                ChatRole::Assistant => "assistant".to_string(),
            },
            content: m.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Pull a human-readable message out of an error body, falling back to the
/// raw body text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

#[async_trait]
impl CompletionClient for OpenAiCompatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let api_request = ChatCompletionRequest {
            model: &self.config.model,
            messages: request.messages.iter().map(WireMessage::from_chat).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request.json_mode.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        let url = format!("{}/chat/completions", self.base_url()?);

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("content-type", "application/json")
            .json(&api_request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(ProviderError::classify(
                Some(status.as_u16()),
                &error_message(&body),
            ));
        }

        let api_response: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::Network(format!("failed to parse response: {e}")))?;

        api_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ProviderError::Network("no choices in response".to_string()))
    }

    fn provider(&self) -> Provider {
        self.provider
    }
}

/// Google Gemini adapter.
pub struct GeminiClient {
    config: ClientConfig,
    http: Client,
}

impl GeminiClient {
    const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com";

    pub fn new(config: ClientConfig) -> Self {
        let http = build_http_client(config.timeout_secs);
        Self { config, http }
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(Self::DEFAULT_BASE_URL)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    max_output_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

/// Split chat messages into Gemini's encoding: system turns become the
/// `systemInstruction`, assistant turns take the `model` role.
fn encode_gemini(messages: &[ChatMessage]) -> (Vec<GeminiContent>, Option<GeminiContent>) {
    let mut contents = Vec::new();
    let mut system: Option<String> = None;

    for m in messages {
        match m.role {
            ChatRole::System => {
                let slot = system.get_or_insert_with(String::new);
                if !slot.is_empty() {
                    slot.push('\n');
                }
                slot.push_str(&m.content);
            }
            ChatRole::User | ChatRole::Assistant => contents.push(GeminiContent {
                role: if m.role == ChatRole::User { "user" } else { "model" }.to_string(),
                parts: vec![GeminiPart {
                    text: m.content.clone(),
                }],
            }),
        }
    }

    let system_instruction = system.map(|text| GeminiContent {
        role: "user".to_string(),
        parts: vec![GeminiPart { text }],
    });

    (contents, system_instruction)
}

#[async_trait]
impl CompletionClient for GeminiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let (contents, system_instruction) = encode_gemini(&request.messages);

        let api_request = GeminiRequest {
            contents,
            system_instruction,
            generation_config: GeminiGenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
                response_mime_type: request.json_mode.then_some("application/json"),
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url(),
            self.config.model,
            self.config.api_key
        );

        let response = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .json(&api_request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(ProviderError::classify(
                Some(status.as_u16()),
                &error_message(&body),
            ));
        }

        let api_response: GeminiResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::Network(format!("failed to parse response: {e}")))?;

        let candidate = api_response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Network("no candidates in response".to_string()))?;

        Ok(candidate
            .content
            .parts
            .into_iter()
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join(""))
    }

    fn provider(&self) -> Provider {
        Provider::Gemini
    }
}

/// Default factory producing real HTTP adapters.
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    /// Request timeout applied to every adapter, in seconds.
    pub timeout_secs: u64,
}

impl Default for HttpClientFactory {
    fn default() -> Self {
        Self { timeout_secs: 120 }
    }
}

impl HttpClientFactory {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }
}

impl ClientFactory for HttpClientFactory {
    fn build(
        &self,
        provider: Provider,
        credential: &str,
        model: &str,
    ) -> Box<dyn CompletionClient> {
        let config = ClientConfig::new(credential, model).with_timeout(self.timeout_secs);
        if provider.is_openai_compatible() {
            Box::new(OpenAiCompatClient::new(provider, config))
        } else {
            Box::new(GeminiClient::new(config))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfig::new("k", "m")
            .with_base_url("https://custom.api.com")
            .with_timeout(30);

        assert_eq!(config.api_key, "k");
        assert_eq!(config.model, "m");
        assert_eq!(config.base_url, Some("https://custom.api.com".to_string()));
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_base_urls_per_provider() {
        let groq = OpenAiCompatClient::new(Provider::Groq, ClientConfig::new("k", "m"));
        assert!(groq.base_url().unwrap().contains("groq.com"));

        let deepseek = OpenAiCompatClient::new(Provider::DeepSeek, ClientConfig::new("k", "m"));
        assert!(deepseek.base_url().unwrap().contains("deepseek.com"));
    }

    #[tokio::test]
    async fn test_gemini_on_compat_adapter_errors_without_panicking() {
        let client = OpenAiCompatClient::new(Provider::Gemini, ClientConfig::new("k", "m"));
        let request = CompletionRequest::new(vec![ChatMessage::user("hi")]);

        let err = client.complete(&request).await.unwrap_err();
        assert!(err.to_string().contains("GeminiClient"));
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"error": {"message": "Rate limit reached", "type": "rate_limit"}}"#;
        assert_eq!(error_message(body), "Rate limit reached");

        // Non-JSON bodies pass through.
        assert_eq!(error_message("gateway timeout"), "gateway timeout");
    }

    #[test]
    fn test_gemini_encoding() {
        let messages = vec![
            ChatMessage::system("be terse"),
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
            ChatMessage::user("again"),
        ];
        let (contents, system) = encode_gemini(&messages);

        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0].role, "user");
        assert_eq!(contents[1].role, "model");
        assert_eq!(contents[2].role, "user");
        assert_eq!(system.unwrap().parts[0].text, "be terse");
    }

    #[test]
    fn test_factory_selects_adapter() {
        let factory = HttpClientFactory::default();
        let client = factory.build(Provider::Gemini, "k", "gemini-2.0-flash");
        assert_eq!(client.provider(), Provider::Gemini);

        let client = factory.build(Provider::Groq, "k", "llama-3.3-70b-versatile");
        assert_eq!(client.provider(), Provider::Groq);
    }

    #[test]
    fn test_json_mode_sets_response_format() {
        let request = CompletionRequest::new(vec![ChatMessage::user("hi")]).with_json_mode(true);
        let api_request = ChatCompletionRequest {
            model: "m",
            messages: request.messages.iter().map(WireMessage::from_chat).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request.json_mode.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };
        let wire = serde_json::to_value(&api_request).unwrap();
        assert_eq!(wire["response_format"]["type"], "json_object");
    }
}
