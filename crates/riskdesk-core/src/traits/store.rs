//! Persistent price store trait definition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::types::{AnalysisResult, DateRange, PriceSeries};

/// Outcome of a series read against the persistent tier.
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesLookup {
    /// The store covers the full requested range.
    Hit {
        series: PriceSeries,
        /// Oldest fetch time among the coverage windows serving the hit;
        /// the freshness decision keys off the stalest contributor.
        fetched_at: DateTime<Utc>,
    },
    /// The store covers part of the range; `gaps` lists the uncovered
    /// sub-ranges the orchestrator still needs from a provider.
    Partial {
        series: PriceSeries,
        fetched_at: DateTime<Utc>,
        gaps: Vec<DateRange>,
    },
    /// Nothing stored for this symbol in this range.
    Miss,
}

/// Trait for the durable price/analysis cache backend.
///
/// The backend is injected into the engine at construction; the engine
/// never reaches for a global.
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Read stored bars for a symbol within a range, reporting coverage.
    async fn get_series(
        &self,
        symbol: &str,
        range: &DateRange,
    ) -> Result<SeriesLookup, StoreError>;

    /// Upsert fetched bars and record that `covered` was satisfied by a
    /// provider at this moment. Idempotent per (symbol, date); differing
    /// values for an existing date overwrite.
    async fn put_series(
        &self,
        series: &PriceSeries,
        covered: &DateRange,
    ) -> Result<(), StoreError>;

    /// The most recent provider write for a symbol, if any. Used to
    /// detect analysis results superseded by a backing-series refresh.
    async fn last_series_write(
        &self,
        symbol: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Read a cached analysis result by fingerprint.
    async fn get_analysis(&self, key: &str) -> Result<Option<AnalysisResult>, StoreError>;

    /// Store an analysis result, superseding any previous row for the key.
    async fn put_analysis(
        &self,
        result: &AnalysisResult,
        symbols: &[String],
    ) -> Result<(), StoreError>;

    /// Drop all rows for one symbol. Returns the number of rows cleared.
    async fn invalidate_symbol(&self, symbol: &str) -> Result<usize, StoreError>;

    /// Drop everything. Returns the number of rows cleared.
    async fn invalidate_all(&self) -> Result<usize, StoreError>;
}
