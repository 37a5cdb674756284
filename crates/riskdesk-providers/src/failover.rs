//! Failover adapter composing a primary and fallback provider.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use riskdesk_core::{
    DateRange, PriceBar, PriceSeries, ProviderError, QuoteProvider, SymbolMatch,
};

use crate::rate_limit::RateLimiter;

const MAX_SYMBOL_LEN: usize = 12;

/// Uniform interface over the primary/fallback provider pair.
///
/// Requests are validated before any network attempt, the primary's
/// token bucket is checked before spending quota on it, and every
/// failure that might succeed elsewhere gets exactly one attempt on the
/// other provider before surfacing.
pub struct FailoverProvider {
    primary: Arc<dyn QuoteProvider>,
    fallback: Arc<dyn QuoteProvider>,
    limiter: RateLimiter,
}

impl FailoverProvider {
    pub fn new(
        primary: Arc<dyn QuoteProvider>,
        fallback: Arc<dyn QuoteProvider>,
        limiter: RateLimiter,
    ) -> Self {
        Self {
            primary,
            fallback,
            limiter,
        }
    }

    /// Symbol validation, applied before any provider is consulted.
    fn validate_symbol(symbol: &str) -> Result<(), ProviderError> {
        let trimmed = symbol.trim();
        if trimmed.is_empty() {
            return Err(ProviderError::InvalidRequest("empty symbol".to_string()));
        }
        if trimmed.len() > MAX_SYMBOL_LEN {
            return Err(ProviderError::InvalidRequest(format!(
                "symbol too long: {:?}",
                symbol
            )));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='))
        {
            return Err(ProviderError::InvalidRequest(format!(
                "symbol contains invalid characters: {:?}",
                symbol
            )));
        }
        Ok(())
    }

    /// Run a request through the chain.
    ///
    /// An empty primary bucket routes straight to the fallback rather
    /// than burning an attempt that the provider would refuse anyway.
    async fn with_failover<T, F, Fut>(&self, op: F) -> Result<T, ProviderError>
    where
        F: Fn(Arc<dyn QuoteProvider>) -> Fut,
        Fut: std::future::Future<Output = Result<T, ProviderError>>,
    {
        let primary_allowed = self.limiter.try_acquire(self.primary.id());
        if !primary_allowed {
            debug!(
                provider = self.primary.id(),
                "primary rate budget empty, routing to fallback"
            );
        }

        let primary_err = if primary_allowed {
            match op(Arc::clone(&self.primary)).await {
                Ok(value) => return Ok(value),
                Err(err) if !err.should_failover() => return Err(err),
                Err(err) => {
                    // The provider reporting quota exhaustion outranks our
                    // local accounting: drain its bucket so nothing else
                    // is sent there until the window refills.
                    if matches!(err, ProviderError::RateLimited { .. }) {
                        self.limiter.drain(self.primary.id());
                    }
                    warn!(provider = self.primary.id(), error = %err, "primary failed, trying fallback");
                    Some(err)
                }
            }
        } else {
            None
        };

        if !self.limiter.try_acquire(self.fallback.id()) {
            return Err(ProviderError::RateLimited {
                provider: self.fallback.id().to_string(),
            });
        }

        match op(Arc::clone(&self.fallback)).await {
            Ok(value) => Ok(value),
            Err(fallback_err) => {
                // A symbol is only NotFound when both providers agree; a
                // transient fallback failure must not mask that the
                // primary still knows the symbol (or vice versa).
                match (&primary_err, &fallback_err) {
                    (Some(ProviderError::SymbolNotFound(_)), ProviderError::SymbolNotFound(s)) => {
                        Err(ProviderError::SymbolNotFound(s.clone()))
                    }
                    _ => Err(fallback_err),
                }
            }
        }
    }
}

#[async_trait]
impl QuoteProvider for FailoverProvider {
    async fn fetch_history(
        &self,
        symbol: &str,
        range: DateRange,
    ) -> Result<PriceSeries, ProviderError> {
        Self::validate_symbol(symbol)?;
        self.with_failover(|p| async move { p.fetch_history(symbol, range).await })
            .await
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<PriceBar, ProviderError> {
        Self::validate_symbol(symbol)?;
        self.with_failover(|p| async move { p.fetch_quote(symbol).await })
            .await
    }

    async fn search_symbols(&self, query: &str) -> Result<Vec<SymbolMatch>, ProviderError> {
        if query.trim().is_empty() {
            return Err(ProviderError::InvalidRequest("empty query".to_string()));
        }
        self.with_failover(|p| async move { p.search_symbols(query).await })
            .await
    }

    fn id(&self) -> &str {
        "failover"
    }
}
