//! Error types for the market data engine.
//!
//! All variants carry owned strings rather than wrapped transport errors so
//! results stay `Clone` and a single failed fetch can be fanned out to every
//! coalesced waiter.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level engine error surfaced to callers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Bad symbol, range, or allocation. Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Symbol unknown to every configured provider. Never retried.
    #[error("Symbol not found: {0}")]
    NotFound(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Analytics error: {0}")]
    Analytics(#[from] AnalyticsError),

    /// A coalesced waiter gave up before the shared in-flight fetch finished.
    /// The fetch itself keeps running for the remaining waiters.
    #[error("Timed out waiting for in-flight fetch of {key}")]
    FetchWait { key: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Translate a provider failure into the caller-facing taxonomy.
    ///
    /// Provider errors never escape the orchestrator untranslated: a symbol
    /// rejected by every provider becomes [`EngineError::NotFound`] and an
    /// invalid request becomes [`EngineError::Validation`].
    pub fn from_provider(err: ProviderError) -> Self {
        match err {
            ProviderError::SymbolNotFound(symbol) => EngineError::NotFound(symbol),
            ProviderError::InvalidRequest(msg) => EngineError::Validation(msg),
            other => EngineError::Provider(other),
        }
    }
}

/// Failures from a quote provider or the failover adapter.
///
/// Serializable because a stale-fallback response embeds the refresh
/// failure as its annotation.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProviderError {
    /// The request was rejected before any network attempt.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The provider does not know the symbol.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// Quota exhausted (HTTP 429 or a provider-specific quota body).
    #[error("Rate limited: {provider}")]
    RateLimited { provider: String },

    /// The request to the provider timed out.
    #[error("Timeout: {provider}")]
    Timeout { provider: String },

    /// 5xx or other transient transport failure.
    #[error("Transient error from {provider}: {message}")]
    Transient { provider: String, message: String },

    /// The provider answered but the payload could not be decoded.
    #[error("Malformed response from {provider}: {message}")]
    Malformed { provider: String, message: String },
}

impl ProviderError {
    /// Whether the failover adapter should try the other provider for the
    /// same request.
    ///
    /// Everything except an invalid request is worth one attempt on the
    /// fallback: a symbol missing from one provider may exist on the other,
    /// and transient/rate-limit failures are exactly what the fallback is
    /// for.
    pub fn should_failover(&self) -> bool {
        !matches!(self, ProviderError::InvalidRequest(_))
    }
}

/// Failures from the persistent price store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Corrupt cache row: {0}")]
    Corrupt(String),
}

/// Failures from the risk analytics functions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    #[error("Insufficient data: need {required} bars, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Invalid allocation: {0}")]
    InvalidAllocation(String),
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_request_never_fails_over() {
        let err = ProviderError::InvalidRequest("empty symbol".to_string());
        assert!(!err.should_failover());
    }

    #[test]
    fn not_found_tries_the_other_provider() {
        let err = ProviderError::SymbolNotFound("ZZZZ".to_string());
        assert!(err.should_failover());
    }

    #[test]
    fn rate_limited_and_transient_fail_over() {
        let rate_limited = ProviderError::RateLimited {
            provider: "alpha_vantage".to_string(),
        };
        let transient = ProviderError::Transient {
            provider: "alpha_vantage".to_string(),
            message: "502 Bad Gateway".to_string(),
        };
        assert!(rate_limited.should_failover());
        assert!(transient.should_failover());
    }

    #[test]
    fn provider_errors_translate_into_the_caller_taxonomy() {
        let not_found = EngineError::from_provider(ProviderError::SymbolNotFound("X".into()));
        assert_eq!(not_found, EngineError::NotFound("X".to_string()));

        let validation =
            EngineError::from_provider(ProviderError::InvalidRequest("bad range".into()));
        assert_eq!(validation, EngineError::Validation("bad range".to_string()));

        let rate_limited = EngineError::from_provider(ProviderError::RateLimited {
            provider: "yahoo".to_string(),
        });
        assert!(matches!(rate_limited, EngineError::Provider(_)));
    }
}
