//! Pipeline configuration.
//!
//! Everything tunable lives here: provider priority and credentials,
//! sampling parameters, retry and correction budgets, history bounds, and
//! the security policy. The struct deserializes from JSON with every field
//! defaulted, so a minimal config only needs to name its providers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::handlers::default_blocked_patterns;
use crate::history;
use crate::llm::{CredentialRotator, Provider};
use crate::resolve::DEFAULT_CORRECTION_ATTEMPTS;

/// How aggressively the pipeline second-guesses the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    /// Blocked patterns enforced, dangerous actions gated.
    High,
    /// Blocked patterns enforced.
    Medium,
    /// No command filtering. For sandboxed hosts only.
    Low,
}

/// Security policy section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub level: SecurityLevel,
    /// Block actions flagged dangerous instead of executing them.
    pub safe_mode: bool,
    /// Commands refused by the executor, matched as substrings. Ignored
    /// at level `low`.
    pub blocked_commands: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            level: SecurityLevel::High,
            safe_mode: true,
            blocked_commands: default_blocked_patterns(),
        }
    }
}

impl SecurityConfig {
    /// The pattern list the executor should enforce.
    pub fn effective_blocked_commands(&self) -> Vec<String> {
        match self.level {
            SecurityLevel::Low => Vec::new(),
            _ => self.blocked_commands.clone(),
        }
    }
}

/// One provider entry: which provider, which model, which credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: Provider,
    /// Model name; falls back to the provider default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub api_keys: Vec<String>,
}

impl ProviderConfig {
    pub fn new(provider: Provider, api_keys: Vec<String>) -> Self {
        Self {
            provider,
            model: None,
            api_keys,
        }
    }

    /// The configured model, or the provider default.
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Providers in failover priority order.
    pub providers: Vec<ProviderConfig>,
    /// Sampling temperature for action resolution. Low by default: the
    /// model is picking a structured action, not writing prose.
    pub temperature: f64,
    pub max_tokens: u32,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,
    /// Attempt budget across rotation and failover for one invocation.
    pub max_attempts: u32,
    /// Correction re-prompts before collapsing to an error action.
    pub max_correction_attempts: u32,
    /// Total conversation messages retained.
    pub history_capacity: usize,
    /// Trailing messages injected into each prompt.
    pub history_window: usize,
    /// Security policy.
    pub security: SecurityConfig,
    /// Shell command timeout.
    pub command_timeout_secs: u64,
    /// Launchable application aliases mapped to shell commands.
    pub apps: HashMap<String, String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            temperature: 0.1,
            max_tokens: 2048,
            request_timeout_secs: 120,
            max_attempts: 6,
            max_correction_attempts: DEFAULT_CORRECTION_ATTEMPTS,
            history_capacity: history::DEFAULT_CAPACITY,
            history_window: history::DEFAULT_WINDOW,
            security: SecurityConfig::default(),
            command_timeout_secs: crate::handlers::DEFAULT_COMMAND_TIMEOUT_SECS,
            apps: HashMap::new(),
        }
    }
}

impl PipelineConfig {
    /// Parse from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants a deserialized config can violate.
    pub fn validate(&self) -> Result<()> {
        if self.providers.is_empty() {
            return Err(Error::config("at least one provider must be configured"));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(Error::config(format!(
                "temperature {} out of range 0.0..=1.0",
                self.temperature
            )));
        }
        if self.max_attempts == 0 {
            return Err(Error::config("max_attempts must be at least 1"));
        }
        Ok(())
    }

    /// Merge credentials from the conventional environment variables
    /// (`GROQ_API_KEY`, `OPENAI_API_KEY`, `DEEPSEEK_API_KEY`,
    /// `GEMINI_API_KEY`). An env key is appended to the matching
    /// provider's pool, or creates the entry when the provider is absent.
    pub fn apply_env_keys(&mut self) {
        let vars = [
            (Provider::Groq, "GROQ_API_KEY"),
            (Provider::OpenAI, "OPENAI_API_KEY"),
            (Provider::DeepSeek, "DEEPSEEK_API_KEY"),
            (Provider::Gemini, "GEMINI_API_KEY"),
        ];

        for (provider, var) in vars {
            let Ok(key) = std::env::var(var) else {
                continue;
            };
            if key.is_empty() {
                continue;
            }
            match self.providers.iter_mut().find(|p| p.provider == provider) {
                Some(entry) => {
                    if !entry.api_keys.contains(&key) {
                        entry.api_keys.push(key);
                    }
                }
                None => self.providers.push(ProviderConfig::new(provider, vec![key])),
            }
        }
    }

    /// Provider failover priority, in configured order.
    pub fn priority(&self) -> Vec<Provider> {
        self.providers.iter().map(|p| p.provider).collect()
    }

    /// Build the credential rotator for the configured providers.
    pub fn rotator(&self) -> CredentialRotator {
        let mut rotator = CredentialRotator::new();
        for entry in &self.providers {
            rotator.add_provider(entry.provider, entry.model(), entry.api_keys.clone());
        }
        rotator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.temperature, 0.1);
        assert_eq!(config.max_tokens, 2048);
        assert_eq!(config.request_timeout_secs, 120);
        assert_eq!(config.max_attempts, 6);
        assert_eq!(config.max_correction_attempts, 2);
        assert_eq!(config.history_capacity, 20);
        assert_eq!(config.history_window, 5);
        assert_eq!(config.security.level, SecurityLevel::High);
        assert!(config.security.safe_mode);
    }

    #[test]
    fn test_low_security_disables_blocking() {
        let mut config = PipelineConfig::default();
        assert!(!config.security.effective_blocked_commands().is_empty());

        config.security.level = SecurityLevel::Low;
        assert!(config.security.effective_blocked_commands().is_empty());
    }

    #[test]
    fn test_minimal_json() {
        let config = PipelineConfig::from_json(
            r#"{
                "providers": [
                    {"provider": "groq", "api_keys": ["gsk-1", "gsk-2"]},
                    {"provider": "gemini", "model": "gemini-2.0-pro", "api_keys": ["g-1"]}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.priority(), vec![Provider::Groq, Provider::Gemini]);
        assert_eq!(config.providers[0].model(), "llama-3.3-70b-versatile");
        assert_eq!(config.providers[1].model(), "gemini-2.0-pro");
        assert_eq!(config.temperature, 0.1);
    }

    #[test]
    fn test_empty_providers_rejected() {
        let err = PipelineConfig::from_json("{}").unwrap_err();
        assert!(err.to_string().contains("provider"));
    }

    #[test]
    fn test_out_of_range_temperature_rejected() {
        let err = PipelineConfig::from_json(
            r#"{"providers": [{"provider": "groq", "api_keys": ["k"]}], "temperature": 1.5}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("temperature"));
    }

    #[test]
    fn test_rotator_uses_configured_models() {
        let mut config = PipelineConfig::default();
        config.providers.push(ProviderConfig::new(
            Provider::Groq,
            vec!["k1".to_string(), "k2".to_string()],
        ));

        let rotator = config.rotator();
        assert!(rotator.has_credentials(Provider::Groq));
        assert_eq!(
            rotator.model(Provider::Groq).unwrap(),
            "llama-3.3-70b-versatile"
        );
    }
}
