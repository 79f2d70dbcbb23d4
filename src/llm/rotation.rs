//! Credential pools and rotation.
//!
//! Each provider owns an ordered list of API credentials plus a set of
//! indices marked exhausted. Rotation advances cyclically past exhausted
//! indices; any successful request clears the set. Providers with zero or
//! one credential never rotate, which forces the dispatcher straight to
//! provider failover.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};

use super::types::Provider;

/// Per-provider credential state.
#[derive(Debug, Clone)]
pub struct ProviderState {
    /// Active model name.
    pub model: String,
    /// Ordered credential strings.
    credentials: Vec<String>,
    /// Index of the active credential. Always in bounds when
    /// `credentials` is non-empty.
    current: usize,
    /// Indices marked exhausted. Subset of valid indices.
    exhausted: HashSet<usize>,
}

impl ProviderState {
    /// Create state for a provider with the given model and credentials.
    pub fn new(model: impl Into<String>, credentials: Vec<String>) -> Self {
        Self {
            model: model.into(),
            credentials,
            current: 0,
            exhausted: HashSet::new(),
        }
    }

    /// The active credential, if any credential is configured.
    pub fn current_credential(&self) -> Option<&str> {
        self.credentials.get(self.current).map(String::as_str)
    }

    /// Number of configured credentials.
    pub fn credential_count(&self) -> usize {
        self.credentials.len()
    }

    /// Whether every configured credential is marked exhausted.
    pub fn is_exhausted(&self) -> bool {
        !self.credentials.is_empty() && self.exhausted.len() >= self.credentials.len()
    }

    /// Number of indices currently marked exhausted.
    pub fn exhausted_count(&self) -> usize {
        self.exhausted.len()
    }

    /// Mark the active credential exhausted and advance to the next
    /// untried one.
    ///
    /// Walks indices cyclically starting just after the current one,
    /// skipping exhausted indices, and activates the first untried index.
    /// Returns false when no untried credential remains, or when the
    /// provider has fewer than two credentials (single-key providers fail
    /// over instead of rotating).
    pub fn rotate(&mut self) -> bool {
        if self.credentials.len() <= 1 {
            if !self.credentials.is_empty() {
                self.exhausted.insert(self.current);
            }
            return false;
        }

        self.exhausted.insert(self.current);

        let n = self.credentials.len();
        for step in 1..=n {
            let candidate = (self.current + step) % n;
            if !self.exhausted.contains(&candidate) {
                self.current = candidate;
                return true;
            }
        }
        false
    }

    /// Clear the exhausted set. Idempotent; called after any successful
    /// request on this provider.
    pub fn reset_exhaustion(&mut self) {
        self.exhausted.clear();
    }
}

/// Owns credential state for every configured provider and applies the
/// rotation policy.
#[derive(Debug, Clone, Default)]
pub struct CredentialRotator {
    states: HashMap<Provider, ProviderState>,
}

impl CredentialRotator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider's credentials. Replaces any existing state.
    pub fn add_provider(
        &mut self,
        provider: Provider,
        model: impl Into<String>,
        credentials: Vec<String>,
    ) {
        self.states
            .insert(provider, ProviderState::new(model, credentials));
    }

    /// Whether the provider is configured with at least one credential.
    pub fn has_credentials(&self, provider: Provider) -> bool {
        self.states
            .get(&provider)
            .map(|s| s.credential_count() > 0)
            .unwrap_or(false)
    }

    /// The provider's active credential.
    pub fn current_credential(&self, provider: Provider) -> Option<&str> {
        self.states.get(&provider)?.current_credential()
    }

    /// The provider's active model name.
    pub fn model(&self, provider: Provider) -> Result<&str> {
        self.states
            .get(&provider)
            .map(|s| s.model.as_str())
            .ok_or_else(|| Error::config(format!("provider {provider} not configured")))
    }

    /// Rotate the provider to its next untried credential. Returns true
    /// if another credential became active.
    pub fn rotate(&mut self, provider: Provider) -> bool {
        match self.states.get_mut(&provider) {
            Some(state) => {
                let rotated = state.rotate();
                if rotated {
                    tracing::debug!(%provider, "rotated to next credential");
                } else {
                    tracing::debug!(%provider, "credentials exhausted");
                }
                rotated
            }
            None => false,
        }
    }

    /// Whether every credential of the provider is marked exhausted.
    pub fn is_exhausted(&self, provider: Provider) -> bool {
        self.states
            .get(&provider)
            .map(ProviderState::is_exhausted)
            .unwrap_or(true)
    }

    /// Clear the provider's exhausted set after a successful request.
    pub fn reset_exhaustion(&mut self, provider: Provider) {
        if let Some(state) = self.states.get_mut(&provider) {
            state.reset_exhaustion();
        }
    }

    /// Number of exhausted credentials for a provider. Zero for unknown
    /// providers.
    pub fn exhausted_count(&self, provider: Provider) -> usize {
        self.states
            .get(&provider)
            .map(ProviderState::exhausted_count)
            .unwrap_or(0)
    }
}
