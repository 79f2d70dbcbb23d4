//! Request dispatcher: one completion call with transparent credential
//! rotation and provider failover.
//!
//! The dispatcher owns the active adapter and drives the retry state
//! machine within a bounded attempt budget:
//!
//! 1. Call the active adapter.
//! 2. Success resets the active provider's exhaustion and returns.
//! 3. Credential-scoped failures (auth, rate limit, quota) rotate to the
//!    next untried credential; once the pool is exhausted, fail over to
//!    the next configured provider in priority order.
//! 4. Network failures skip rotation and fail over directly, but only for
//!    the first two attempts; after that they are fatal.
//! 5. An exhausted budget, or no remaining provider, surfaces as
//!    [`Error::PipelineExhausted`] carrying the last observed failure.
//!
//! A provider abandoned within one invocation is not revisited until the
//! next invocation; exhaustion itself is only cleared by a success on that
//! provider.

use std::collections::HashSet;

use crate::error::{Error, ProviderError, Result};

use super::client::{ClientFactory, CompletionClient};
use super::rotation::CredentialRotator;
use super::types::{CompletionRequest, Provider};

/// How many attempts may respond to a network-class failure with provider
/// failover before it is treated as fatal.
const NETWORK_FAILOVER_ATTEMPTS: u32 = 2;

/// Issues completion calls through the current adapter, rotating
/// credentials and failing over between providers on failure.
pub struct RequestDispatcher {
    rotator: CredentialRotator,
    /// Fixed provider priority order, configuration-driven.
    priority: Vec<Provider>,
    active: Provider,
    adapter: Box<dyn CompletionClient>,
    factory: Box<dyn ClientFactory>,
    max_attempts: u32,
}

impl RequestDispatcher {
    /// Create a dispatcher over the given credential pool.
    ///
    /// The first provider in `priority` with at least one credential
    /// becomes active. Fails when no provider has a credential.
    pub fn new(
        rotator: CredentialRotator,
        priority: Vec<Provider>,
        factory: Box<dyn ClientFactory>,
        max_attempts: u32,
    ) -> Result<Self> {
        let active = priority
            .iter()
            .copied()
            .find(|p| rotator.has_credentials(*p))
            .ok_or_else(|| Error::config("no provider has a configured credential"))?;

        let adapter = Self::build_adapter(&rotator, &*factory, active)?;

        Ok(Self {
            rotator,
            priority,
            active,
            adapter,
            factory,
            max_attempts,
        })
    }

    /// The provider currently receiving requests.
    pub fn active_provider(&self) -> Provider {
        self.active
    }

    /// Inspect the credential pool (exhaustion state, active keys).
    pub fn rotator(&self) -> &CredentialRotator {
        &self.rotator
    }

    fn build_adapter(
        rotator: &CredentialRotator,
        factory: &dyn ClientFactory,
        provider: Provider,
    ) -> Result<Box<dyn CompletionClient>> {
        let credential = rotator
            .current_credential(provider)
            .ok_or_else(|| Error::config(format!("provider {provider} has no credential")))?;
        let model = rotator.model(provider)?;
        Ok(factory.build(provider, credential, model))
    }

    /// Re-initialize the adapter for the active provider's current
    /// credential. Called after every rotation or failover.
    fn rebuild_adapter(&mut self) -> Result<()> {
        self.adapter = Self::build_adapter(&self.rotator, &*self.factory, self.active)?;
        Ok(())
    }

    /// Switch to the next provider in priority order that has credentials
    /// and was not already abandoned in this invocation. The new
    /// provider's exhaustion is reset so its full pool is available.
    fn fail_over(&mut self, abandoned: &HashSet<Provider>) -> Result<bool> {
        let position = self
            .priority
            .iter()
            .position(|p| *p == self.active)
            .unwrap_or(0);

        for candidate in self.priority.iter().skip(position + 1).copied() {
            if abandoned.contains(&candidate) || !self.rotator.has_credentials(candidate) {
                continue;
            }
            tracing::warn!(from = %self.active, to = %candidate, "provider failover");
            self.active = candidate;
            self.rotator.reset_exhaustion(candidate);
            self.rebuild_adapter()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Issue one completion call, retrying through rotation and failover
    /// within the attempt budget.
    pub async fn request_completion(&mut self, request: &CompletionRequest) -> Result<String> {
        let mut abandoned: HashSet<Provider> = HashSet::new();
        let mut last_error: Option<ProviderError> = None;
        let mut attempts = 0u32;

        while attempts < self.max_attempts {
            attempts += 1;

            match self.adapter.complete(request).await {
                Ok(text) => {
                    self.rotator.reset_exhaustion(self.active);
                    return Ok(text);
                }
                Err(err) => {
                    tracing::warn!(provider = %self.active, attempt = attempts, error = %err, "completion failed");
                    let credential_scoped = err.is_credential_scoped();
                    last_error = Some(err);

                    if credential_scoped {
                        if self.rotator.rotate(self.active) {
                            self.rebuild_adapter()?;
                            continue;
                        }
                        // Pool exhausted on this provider.
                        abandoned.insert(self.active);
                        if self.fail_over(&abandoned)? {
                            continue;
                        }
                        break;
                    }

                    // Network-class failure: no rotation, bounded failover.
                    if attempts > NETWORK_FAILOVER_ATTEMPTS {
                        break;
                    }
                    abandoned.insert(self.active);
                    if !self.fail_over(&abandoned)? {
                        break;
                    }
                }
            }
        }

        let last = last_error
            .unwrap_or_else(|| ProviderError::Network("no completion attempted".to_string()));
        Err(Error::exhausted(attempts, last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::ChatMessage;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    /// Adapter that pops pre-scripted outcomes and records which
    /// (provider, credential) pair served each call.
    struct ScriptedClient {
        provider: Provider,
        credential: String,
        script: Arc<Mutex<Vec<std::result::Result<String, ProviderError>>>>,
        calls: Arc<Mutex<Vec<(Provider, String)>>>,
    }

    #[async_trait::async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> std::result::Result<String, ProviderError> {
            self.calls
                .lock()
                .unwrap()
                .push((self.provider, self.credential.clone()));
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                return Err(ProviderError::Network("script exhausted".to_string()));
            }
            script.remove(0)
        }

        fn provider(&self) -> Provider {
            self.provider
        }
    }

    struct ScriptedFactory {
        script: Arc<Mutex<Vec<std::result::Result<String, ProviderError>>>>,
        calls: Arc<Mutex<Vec<(Provider, String)>>>,
    }

    impl ScriptedFactory {
        fn new(
            outcomes: Vec<std::result::Result<String, ProviderError>>,
        ) -> (Self, Arc<Mutex<Vec<(Provider, String)>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    script: Arc::new(Mutex::new(outcomes)),
                    calls: Arc::clone(&calls),
                },
                calls,
            )
        }
    }

    impl ClientFactory for ScriptedFactory {
        fn build(
            &self,
            provider: Provider,
            credential: &str,
            _model: &str,
        ) -> Box<dyn CompletionClient> {
            Box::new(ScriptedClient {
                provider,
                credential: credential.to_string(),
                script: Arc::clone(&self.script),
                calls: Arc::clone(&self.calls),
            })
        }
    }

    fn rotator_with(providers: &[(Provider, usize)]) -> CredentialRotator {
        let mut rotator = CredentialRotator::new();
        for (provider, key_count) in providers {
            let keys = (0..*key_count).map(|i| format!("{provider}-key-{i}")).collect();
            rotator.add_provider(*provider, provider.default_model(), keys);
        }
        rotator
    }

    fn request() -> CompletionRequest {
        CompletionRequest::new(vec![ChatMessage::user("hello")])
    }

    fn rate_limited() -> std::result::Result<String, ProviderError> {
        Err(ProviderError::RateLimit("429".to_string()))
    }

    #[tokio::test]
    async fn test_success_resets_exhaustion() {
        let (factory, _) = ScriptedFactory::new(vec![rate_limited(), Ok("ok".to_string())]);
        let rotator = rotator_with(&[(Provider::Groq, 2)]);
        let mut dispatcher =
            RequestDispatcher::new(rotator, vec![Provider::Groq], Box::new(factory), 6).unwrap();

        let text = dispatcher.request_completion(&request()).await.unwrap();
        assert_eq!(text, "ok");
        // The rate-limited key was marked exhausted, then the success
        // cleared the set.
        assert_eq!(dispatcher.rotator().exhausted_count(Provider::Groq), 0);
    }

    #[tokio::test]
    async fn test_k_failures_rotate_k_minus_one_times_then_fail_over() {
        // Three Groq keys all rate limited, then OpenAI succeeds.
        let (factory, calls) = ScriptedFactory::new(vec![
            rate_limited(),
            rate_limited(),
            rate_limited(),
            Ok("from-openai".to_string()),
        ]);
        let rotator = rotator_with(&[(Provider::Groq, 3), (Provider::OpenAI, 1)]);
        let mut dispatcher = RequestDispatcher::new(
            rotator,
            vec![Provider::Groq, Provider::OpenAI],
            Box::new(factory),
            6,
        )
        .unwrap();

        let text = dispatcher.request_completion(&request()).await.unwrap();
        assert_eq!(text, "from-openai");

        let calls = calls.lock().unwrap();
        let credentials: Vec<&str> = calls.iter().map(|(_, c)| c.as_str()).collect();
        // Two rotations walk the whole Groq pool before failover.
        assert_eq!(
            credentials,
            vec!["groq-key-0", "groq-key-1", "groq-key-2", "openai-key-0"]
        );
        assert_eq!(dispatcher.active_provider(), Provider::OpenAI);
    }

    #[tokio::test]
    async fn test_single_credential_auth_failure_exhausts() {
        let (factory, _) =
            ScriptedFactory::new(vec![Err(ProviderError::Auth("bad key".to_string()))]);
        let rotator = rotator_with(&[(Provider::Groq, 1)]);
        let mut dispatcher =
            RequestDispatcher::new(rotator, vec![Provider::Groq], Box::new(factory), 6).unwrap();

        let err = dispatcher.request_completion(&request()).await.unwrap_err();
        match err {
            Error::PipelineExhausted { attempts, last } => {
                assert_eq!(attempts, 1);
                assert!(matches!(last, ProviderError::Auth(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_quota_failover_leaves_primary_exhausted() {
        let (factory, _) = ScriptedFactory::new(vec![
            Err(ProviderError::Quota("quota".to_string())),
            Ok("secondary".to_string()),
        ]);
        let rotator = rotator_with(&[(Provider::Groq, 1), (Provider::Gemini, 1)]);
        let mut dispatcher = RequestDispatcher::new(
            rotator,
            vec![Provider::Groq, Provider::Gemini],
            Box::new(factory),
            6,
        )
        .unwrap();

        let text = dispatcher.request_completion(&request()).await.unwrap();
        assert_eq!(text, "secondary");
        // Primary stays exhausted until a future success on it.
        assert!(dispatcher.rotator().is_exhausted(Provider::Groq));
        assert_eq!(dispatcher.rotator().exhausted_count(Provider::Gemini), 0);
    }

    #[tokio::test]
    async fn test_network_error_fails_over_without_rotation() {
        let (factory, calls) = ScriptedFactory::new(vec![
            Err(ProviderError::Network("reset".to_string())),
            Ok("recovered".to_string()),
        ]);
        // Groq has a spare key, but network failures must not touch it.
        let rotator = rotator_with(&[(Provider::Groq, 2), (Provider::OpenAI, 1)]);
        let mut dispatcher = RequestDispatcher::new(
            rotator,
            vec![Provider::Groq, Provider::OpenAI],
            Box::new(factory),
            6,
        )
        .unwrap();

        let text = dispatcher.request_completion(&request()).await.unwrap();
        assert_eq!(text, "recovered");

        let calls = calls.lock().unwrap();
        assert_eq!(calls[0], (Provider::Groq, "groq-key-0".to_string()));
        assert_eq!(calls[1], (Provider::OpenAI, "openai-key-0".to_string()));
    }

    #[tokio::test]
    async fn test_network_errors_fatal_after_two_attempts() {
        let (factory, calls) = ScriptedFactory::new(vec![
            Err(ProviderError::Network("a".to_string())),
            Err(ProviderError::Network("b".to_string())),
            Err(ProviderError::Network("c".to_string())),
        ]);
        let rotator = rotator_with(&[
            (Provider::Groq, 1),
            (Provider::OpenAI, 1),
            (Provider::Gemini, 1),
        ]);
        let mut dispatcher = RequestDispatcher::new(
            rotator,
            vec![Provider::Groq, Provider::OpenAI, Provider::Gemini],
            Box::new(factory),
            6,
        )
        .unwrap();

        let err = dispatcher.request_completion(&request()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::PipelineExhausted {
                attempts: 3,
                last: ProviderError::Network(_)
            }
        ));
        // Two failovers happened, then the third network failure was fatal.
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_attempt_budget_bounds_total_calls() {
        let (factory, calls) = ScriptedFactory::new(vec![
            rate_limited(),
            rate_limited(),
            rate_limited(),
            rate_limited(),
            rate_limited(),
        ]);
        let rotator = rotator_with(&[(Provider::Groq, 10)]);
        let mut dispatcher =
            RequestDispatcher::new(rotator, vec![Provider::Groq], Box::new(factory), 3).unwrap();

        let err = dispatcher.request_completion(&request()).await.unwrap_err();
        assert!(matches!(err, Error::PipelineExhausted { attempts: 3, .. }));
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_no_credentials_is_config_error() {
        let (factory, _) = ScriptedFactory::new(vec![]);
        let rotator = CredentialRotator::new();
        let result =
            RequestDispatcher::new(rotator, vec![Provider::Groq], Box::new(factory), 6);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_clean_slate_between_invocations() {
        // First invocation exhausts Groq and succeeds on OpenAI; second
        // invocation starts from OpenAI and succeeds directly.
        let (factory, calls) = ScriptedFactory::new(vec![
            Err(ProviderError::Quota("q".to_string())),
            Ok("one".to_string()),
            Ok("two".to_string()),
        ]);
        let rotator = rotator_with(&[(Provider::Groq, 1), (Provider::OpenAI, 1)]);
        let mut dispatcher = RequestDispatcher::new(
            rotator,
            vec![Provider::Groq, Provider::OpenAI],
            Box::new(factory),
            6,
        )
        .unwrap();

        assert_eq!(dispatcher.request_completion(&request()).await.unwrap(), "one");
        assert_eq!(dispatcher.request_completion(&request()).await.unwrap(), "two");
        assert_eq!(calls.lock().unwrap().len(), 3);
        assert!(dispatcher.rotator().is_exhausted(Provider::Groq));
    }
}
