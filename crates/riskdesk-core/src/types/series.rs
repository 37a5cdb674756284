//! Price series: an ordered view over one symbol's bars.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::bar::PriceBar;
use super::range::DateRange;
use crate::error::ProviderError;

/// How overlapping bars are reconciled when a fresh fetch collides with
/// stored data on the same (symbol, date).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// The newly fetched bar replaces the stored one. Providers correct
    /// historical data occasionally, so this is the default.
    #[default]
    FreshestWins,
    /// The stored bar is kept and the fetched value discarded.
    StoredWins,
}

/// Ordered sequence of bars for one symbol.
///
/// Invariant: bars are sorted ascending by date with no duplicate dates.
/// A series is a derived view over stored bars, never persisted directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Create an empty series.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bars: Vec::new(),
        }
    }

    /// Build a series from bars in any order. Sorts ascending by date and
    /// drops duplicate dates, keeping the last occurrence.
    pub fn from_bars(symbol: impl Into<String>, mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        bars.dedup_by(|next, prev| {
            if next.date == prev.date {
                // keep the later element: overwrite prev with next, drop next
                std::mem::swap(next, prev);
                true
            } else {
                false
            }
        });
        Self {
            symbol: symbol.into(),
            bars,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn first(&self) -> Option<&PriceBar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    /// Extract close prices in date order.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Extract bar dates in order.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.bars.iter().map(|b| b.date).collect()
    }

    /// The date span actually present in the series.
    pub fn span(&self) -> Option<DateRange> {
        match (self.bars.first(), self.bars.last()) {
            (Some(first), Some(last)) => Some(DateRange {
                start: first.date,
                end: last.date,
            }),
            _ => None,
        }
    }

    /// The sub-series falling inside `range`.
    pub fn sub_range(&self, range: &DateRange) -> PriceSeries {
        let bars = self
            .bars
            .iter()
            .filter(|b| range.contains(b.date))
            .cloned()
            .collect();
        Self {
            symbol: self.symbol.clone(),
            bars,
        }
    }

    /// Merge newly fetched bars into this series.
    ///
    /// Non-colliding dates are unioned; on a date collision the winner is
    /// decided by `policy`.
    pub fn merge(&self, fetched: &PriceSeries, policy: MergePolicy) -> PriceSeries {
        let mut combined: Vec<PriceBar> = Vec::with_capacity(self.len() + fetched.len());
        match policy {
            // from_bars keeps the last occurrence on duplicate dates, so
            // ordering decides the winner.
            MergePolicy::FreshestWins => {
                combined.extend(self.bars.iter().cloned());
                combined.extend(fetched.bars.iter().cloned());
            }
            MergePolicy::StoredWins => {
                combined.extend(fetched.bars.iter().cloned());
                combined.extend(self.bars.iter().cloned());
            }
        }
        PriceSeries::from_bars(self.symbol.clone(), combined)
    }
}

/// Why an otherwise-successful response carries stale data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaleInfo {
    /// When the returned data was last fetched from a provider.
    pub fetched_at: DateTime<Utc>,
    /// The refresh failure that forced the stale fallback.
    pub reason: ProviderError,
}

/// A resolved price series, annotated when the data could not be
/// refreshed. Staleness is surfaced structurally, never merged into the
/// error channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesResponse {
    pub series: PriceSeries,
    pub stale: Option<StaleInfo>,
}

/// A resolved live quote with the same staleness contract as
/// [`SeriesResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteResponse {
    pub bar: PriceBar,
    pub stale: Option<StaleInfo>,
}
