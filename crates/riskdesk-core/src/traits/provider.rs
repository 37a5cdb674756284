//! Quote provider trait definition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::types::{DateRange, PriceBar, PriceSeries};

/// A symbol search hit, normalized across providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolMatch {
    pub symbol: String,
    pub name: String,
    pub region: Option<String>,
}

/// Trait for market data providers.
///
/// Implemented by each concrete provider client and by the failover
/// adapter that composes them, so callers hold a single
/// `Arc<dyn QuoteProvider>` regardless of the fallback chain behind it.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Fetch daily bars for a symbol over an inclusive date range.
    ///
    /// Returns bars ordered ascending by date. A provider may return fewer
    /// bars than calendar days (market holidays, weekends); it must not
    /// invent bars for missing days.
    async fn fetch_history(
        &self,
        symbol: &str,
        range: DateRange,
    ) -> Result<PriceSeries, ProviderError>;

    /// Fetch the most recent daily bar for a symbol.
    async fn fetch_quote(&self, symbol: &str) -> Result<PriceBar, ProviderError>;

    /// Search for symbols matching a free-text query.
    async fn search_symbols(&self, query: &str) -> Result<Vec<SymbolMatch>, ProviderError>;

    /// Stable provider identifier used in logs and rate limiting.
    fn id(&self) -> &str;
}
