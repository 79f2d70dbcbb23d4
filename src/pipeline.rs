//! The end-to-end pipeline: utterance in, routed outcome out.
//!
//! One [`Pipeline::process`] call runs the whole chain: build a prompt
//! from the system instructions plus a recent history window, obtain a
//! completion through the dispatcher, resolve it into a validated
//! [`Action`], record the turn, and route the action to its handler. The
//! call is infallible once the pipeline is constructed; every failure mode
//! collapses into an `error` action and surfaces as routed text.

use crate::action::{Action, ActionKind};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::history::ConversationHistory;
use crate::llm::{
    ChatMessage, ClientFactory, CompletionRequest, HttpClientFactory, RequestDispatcher,
};
use crate::resolve::ActionResolver;
use crate::router::{ActionRouter, Capabilities, OutputSink};

/// Owns the full resolution chain for one session.
pub struct Pipeline {
    config: PipelineConfig,
    dispatcher: RequestDispatcher,
    resolver: ActionResolver,
    router: ActionRouter,
    history: ConversationHistory,
}

impl Pipeline {
    /// Build a pipeline speaking to real provider endpoints.
    pub fn new(config: PipelineConfig, capabilities: Capabilities) -> Result<Self> {
        let factory = HttpClientFactory::new(config.request_timeout_secs);
        Self::with_factory(config, capabilities, Box::new(factory))
    }

    /// Build a pipeline with a custom adapter factory.
    pub fn with_factory(
        config: PipelineConfig,
        capabilities: Capabilities,
        factory: Box<dyn ClientFactory>,
    ) -> Result<Self> {
        config.validate()?;

        let dispatcher = RequestDispatcher::new(
            config.rotator(),
            config.priority(),
            factory,
            config.max_attempts,
        )?;

        Ok(Self {
            dispatcher,
            resolver: ActionResolver::new(config.max_correction_attempts),
            router: ActionRouter::new(capabilities, config.security.safe_mode),
            history: ConversationHistory::new(config.history_capacity),
            config,
        })
    }

    /// Process one utterance end to end and return the outcome text.
    pub async fn process(&mut self, utterance: &str) -> String {
        let action = self.resolve_action(utterance).await;
        self.record_turn(utterance, &action);
        self.router.route(&action).await
    }

    /// Like [`process`](Self::process), but also emits the outcome through
    /// the sink.
    pub async fn process_to(&mut self, utterance: &str, sink: &mut dyn OutputSink) -> String {
        let outcome = self.process(utterance).await;
        sink.emit(&outcome);
        outcome
    }

    /// Resolve an utterance into a validated action without routing it.
    pub async fn resolve_action(&mut self, utterance: &str) -> Action {
        let request = self.build_request(utterance);

        let raw = match self.dispatcher.request_completion(&request).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(error = %e, "completion failed");
                return Action::error(format!("action resolution failed: {e}"));
            }
        };

        self.resolver
            .resolve(&mut self.dispatcher, &request, &raw)
            .await
    }

    /// The conversation so far.
    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    fn record_turn(&mut self, utterance: &str, action: &Action) {
        self.history.push(ChatMessage::user(utterance));
        // The assistant turn is the action itself, so correction context
        // and follow-up prompts see what was decided, not free text.
        if let Ok(json) = serde_json::to_string(action) {
            self.history.push(ChatMessage::assistant(json));
        }
    }

    fn build_request(&self, utterance: &str) -> CompletionRequest {
        let mut messages = vec![ChatMessage::system(self.system_prompt())];
        messages.extend(self.history.recent(self.config.history_window));
        messages.push(ChatMessage::user(utterance));

        CompletionRequest::new(messages)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens)
            .with_json_mode(true)
    }

    /// The instruction block sent as the system message of every request.
    fn system_prompt(&self) -> String {
        let mut prompt = String::new();
        prompt.push_str(
            "You are a personal assistant that maps each user request to \
             exactly one action.\n\
             Respond with a single JSON object and nothing else.\n\
             The object must have an \"action\" field set to one of:\n",
        );
        for (tag, help) in ActionKind::TAG_HELP {
            prompt.push_str("  - ");
            prompt.push_str(tag);
            prompt.push_str(": ");
            prompt.push_str(help);
            prompt.push('\n');
        }
        prompt.push_str(
            "\nFields marked ? are optional; all others are required.\n\
             Include a short \"reason\" field explaining the choice.\n\
             Set \"is_dangerous\": true for anything destructive or \
             irreversible (deleting files, killing processes, sending \
             messages on the user's behalf).\n\
             Use \"reply_op\" for conversation and questions you can \
             answer directly.\n\
             Use \"error\" when the request is impossible or too ambiguous \
             to act on, with the problem in \"reason\".\n",
        );
        prompt.push_str(&format!(
            "Security level: {:?}.\n",
            self.config.security.level
        ));
        if self.config.security.safe_mode {
            prompt.push_str("Dangerous actions will require confirmation.\n");
        }
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::error::ProviderError;
    use crate::llm::{CompletionClient, Provider};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    type Script = Arc<Mutex<Vec<std::result::Result<String, ProviderError>>>>;

    struct ScriptedClient {
        provider: Provider,
        script: Script,
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> std::result::Result<String, ProviderError> {
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(ProviderError::Network("script empty".to_string())))
        }

        fn provider(&self) -> Provider {
            self.provider
        }
    }

    struct ScriptedFactory {
        script: Script,
    }

    impl ClientFactory for ScriptedFactory {
        fn build(
            &self,
            provider: Provider,
            _credential: &str,
            _model: &str,
        ) -> Box<dyn CompletionClient> {
            Box::new(ScriptedClient {
                provider,
                script: Arc::clone(&self.script),
            })
        }
    }

    fn pipeline(
        replies: Vec<std::result::Result<String, ProviderError>>,
    ) -> Pipeline {
        let mut config = PipelineConfig::default();
        config.providers.push(ProviderConfig::new(
            Provider::Groq,
            vec!["key".to_string()],
        ));
        config.security.safe_mode = false;

        let script = Arc::new(Mutex::new(replies.into_iter().rev().collect()));
        Pipeline::with_factory(
            config,
            Capabilities::new(),
            Box::new(ScriptedFactory { script }),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_utterance_to_routed_reply() {
        let mut pipeline = pipeline(vec![Ok(
            r#"{"action": "reply_op", "content": "hello!", "reason": "greeting"}"#.to_string(),
        )]);

        let out = pipeline.process("say hello").await;
        assert_eq!(out, "hello!");
    }

    #[tokio::test]
    async fn test_turn_recorded_in_history() {
        let mut pipeline = pipeline(vec![Ok(
            r#"{"action": "reply_op", "content": "hi"}"#.to_string(),
        )]);

        pipeline.process("say hi").await;
        assert_eq!(pipeline.history().len(), 2);

        let recent = pipeline.history().recent(2);
        assert_eq!(recent[0].content, "say hi");
        assert!(recent[1].content.contains("\"reply_op\""));
    }

    #[tokio::test]
    async fn test_provider_failure_becomes_error_text() {
        let mut pipeline = pipeline(vec![Err(ProviderError::Auth("bad key".to_string()))]);

        let out = pipeline.process("do something").await;
        assert!(out.starts_with("[ERROR]"), "got: {out}");
        assert!(out.contains("bad key"));
    }

    #[tokio::test]
    async fn test_invalid_reply_corrected_then_routed() {
        let mut pipeline = pipeline(vec![
            Ok("I think you want a greeting".to_string()),
            Ok(r#"{"action": "reply_op", "content": "hi"}"#.to_string()),
        ]);

        let out = pipeline.process("hi").await;
        assert_eq!(out, "hi");
    }

    #[tokio::test]
    async fn test_unconfigured_capability_routed_as_disabled() {
        let mut pipeline = pipeline(vec![Ok(
            r#"{"action": "web_search_op", "query": "weather"}"#.to_string(),
        )]);

        let out = pipeline.process("what's the weather").await;
        assert_eq!(out, "[DISABLED] web_search_op: capability not configured");
    }

    #[tokio::test]
    async fn test_request_shape() {
        let pipeline = pipeline(vec![]);
        let request = pipeline.build_request("open firefox");

        assert!(request.json_mode);
        assert_eq!(request.temperature, 0.1);
        assert_eq!(request.messages.len(), 2);
        for tag in ActionKind::VALID_TAGS {
            assert!(
                request.messages[0].content.contains(tag),
                "system prompt missing {tag}"
            );
        }
        assert_eq!(request.messages[1].content, "open firefox");
    }

    #[tokio::test]
    async fn test_process_to_emits_outcome() {
        let mut pipeline = pipeline(vec![Ok(
            r#"{"action": "reply_op", "content": "done"}"#.to_string(),
        )]);

        let mut sink = crate::router::BufferSink::default();
        pipeline.process_to("do it", &mut sink).await;
        assert_eq!(sink.lines, vec!["done"]);
    }
}
