//! Error types for aide-core.

use thiserror::Error;

/// Result type alias using aide-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a provider adapter, normalized at the adapter
/// boundary. No other component branches on vendor-specific errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Bad or revoked credential.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Provider rejected the request due to request-rate limits.
    #[error("rate limited: {0}")]
    RateLimit(String),

    /// Credential or account quota exhausted.
    #[error("quota exhausted: {0}")]
    Quota(String),

    /// Transport failure, malformed response, or anything unclassifiable.
    #[error("network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Classify an HTTP failure into the four-kind taxonomy.
    ///
    /// Status codes are checked before message substrings: 401 (or
    /// "unauthorized") is an auth failure, 429 (or "rate limit") is a rate
    /// limit, a body mentioning "quota" is a quota failure, and everything
    /// else is treated as a network error.
    pub fn classify(status: Option<u16>, message: &str) -> Self {
        let lower = message.to_lowercase();

        if status == Some(401) || lower.contains("unauthorized") || lower.contains("invalid api key")
        {
            Self::Auth(message.to_string())
        } else if status == Some(429) || lower.contains("rate limit") {
            Self::RateLimit(message.to_string())
        } else if lower.contains("quota") {
            Self::Quota(message.to_string())
        } else {
            Self::Network(message.to_string())
        }
    }

    /// Whether this failure is scoped to the active credential, making
    /// rotation to a sibling credential worthwhile before failing over.
    pub fn is_credential_scoped(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::RateLimit(_) | Self::Quota(_))
    }
}

/// Errors that can occur in the action-resolution pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// A single provider call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Every rotation and failover option was exhausted.
    #[error("all providers exhausted after {attempts} attempts: {last}")]
    PipelineExhausted { attempts: u32, last: ProviderError },

    /// Model output failed JSON parsing or action schema validation.
    #[error("schema validation failed: {0}")]
    SchemaValidation(String),

    /// A routed effect handler failed. The router prefixes the action tag
    /// when rendering, so the display carries only the message.
    #[error("{message}")]
    Handler { action: String, message: String },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a pipeline-exhausted error.
    pub fn exhausted(attempts: u32, last: ProviderError) -> Self {
        Self::PipelineExhausted { attempts, last }
    }

    /// Create a schema validation error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::SchemaValidation(message.into())
    }

    /// Create a handler error.
    pub fn handler(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            action: action.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_status() {
        assert!(matches!(
            ProviderError::classify(Some(401), "nope"),
            ProviderError::Auth(_)
        ));
        assert!(matches!(
            ProviderError::classify(Some(429), "slow down"),
            ProviderError::RateLimit(_)
        ));
        assert!(matches!(
            ProviderError::classify(Some(500), "internal"),
            ProviderError::Network(_)
        ));
    }

    #[test]
    fn test_classify_by_substring() {
        assert!(matches!(
            ProviderError::classify(None, "Unauthorized request"),
            ProviderError::Auth(_)
        ));
        assert!(matches!(
            ProviderError::classify(None, "Rate limit reached for model"),
            ProviderError::RateLimit(_)
        ));
        assert!(matches!(
            ProviderError::classify(None, "You exceeded your current quota"),
            ProviderError::Quota(_)
        ));
        assert!(matches!(
            ProviderError::classify(None, "connection reset by peer"),
            ProviderError::Network(_)
        ));
    }

    #[test]
    fn test_status_wins_over_substring() {
        // A 429 whose body mentions quota still classifies as rate limit.
        assert!(matches!(
            ProviderError::classify(Some(429), "quota exceeded, retry later"),
            ProviderError::RateLimit(_)
        ));
    }

    #[test]
    fn test_credential_scoped() {
        assert!(ProviderError::Auth("x".into()).is_credential_scoped());
        assert!(ProviderError::RateLimit("x".into()).is_credential_scoped());
        assert!(ProviderError::Quota("x".into()).is_credential_scoped());
        assert!(!ProviderError::Network("x".into()).is_credential_scoped());
    }
}
