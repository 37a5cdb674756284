//! The cache orchestrator and public engine API.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use riskdesk_analytics::{analyze_portfolio, analyze_symbol, position_pnl};
use riskdesk_cache::MemoryCache;
use riskdesk_core::{
    AnalysisResult, CacheEntry, DateRange, EngineError, EngineResult, FreshnessPolicy,
    MergePolicy, PortfolioAllocation, PositionInput, PositionPnl, PriceBar, PriceSeries,
    PriceStore, QuoteProvider, QuoteResponse, SeriesLookup, SeriesResponse, StaleInfo,
    SymbolMatch, TtlClass,
};

use crate::coalesce::SingleFlight;
use crate::fingerprint::analysis_key;

/// Engine tunables. Constructed from configuration by the caller.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub freshness: FreshnessPolicy,
    pub merge_policy: MergePolicy,
    /// Entry cap per memory cache tier.
    pub memory_capacity: usize,
    /// Bounded wait for joining an in-flight fetch.
    pub fetch_wait: Duration,
    /// Default risk-free rate when a request does not override it.
    pub risk_free_rate: f64,
    /// Minimum aligned return count for a correlation cell.
    pub min_correlation_overlap: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            freshness: FreshnessPolicy::default(),
            merge_policy: MergePolicy::default(),
            memory_capacity: 256,
            fetch_wait: Duration::from_secs(30),
            risk_free_rate: 0.02,
            min_correlation_overlap: 30,
        }
    }
}

/// Memory-tier value for a symbol's series: the widest recently resolved
/// window, so a request for any sub-range of it is a superset hit.
#[derive(Debug, Clone)]
struct SeriesSlot {
    series: PriceSeries,
    covered: DateRange,
}

mod keys {
    pub fn series(symbol: &str) -> String {
        format!("series:{}", symbol)
    }

    pub fn quote(symbol: &str) -> String {
        format!("quote:{}", symbol)
    }

    pub fn series_flight(symbol: &str, range: &riskdesk_core::DateRange) -> String {
        format!("series:{}:{}", symbol, range)
    }
}

/// The market data cache and risk analytics engine.
///
/// Constructed once per process with its storage backend and provider
/// chain injected; holds no global state. Cache locks are never held
/// across a provider round trip.
pub struct MarketDataEngine {
    provider: Arc<dyn QuoteProvider>,
    store: Arc<dyn PriceStore>,
    series_cache: MemoryCache<SeriesSlot>,
    quote_cache: MemoryCache<PriceBar>,
    analysis_cache: MemoryCache<AnalysisResult>,
    series_flight: SingleFlight<SeriesResponse>,
    quote_flight: SingleFlight<QuoteResponse>,
    options: EngineOptions,
}

impl MarketDataEngine {
    pub fn new(
        provider: Arc<dyn QuoteProvider>,
        store: Arc<dyn PriceStore>,
        options: EngineOptions,
    ) -> Self {
        Self {
            series_cache: MemoryCache::new(options.memory_capacity, options.freshness),
            quote_cache: MemoryCache::new(options.memory_capacity, options.freshness),
            analysis_cache: MemoryCache::new(options.memory_capacity, options.freshness),
            series_flight: SingleFlight::new(options.fetch_wait),
            quote_flight: SingleFlight::new(options.fetch_wait),
            provider,
            store,
            options,
        }
    }

    // ------------------------------------------------------------------
    // Series resolution
    // ------------------------------------------------------------------

    /// Resolve a symbol's daily series for an inclusive date range.
    ///
    /// Walks memory -> store -> provider, fetching only uncovered gaps
    /// and writing results back up the chain. When the provider fails
    /// but cached bars exist, the stale series is returned with a
    /// [`StaleInfo`] annotation instead of an error.
    pub async fn get_historical_series(
        &self,
        symbol: &str,
        range: DateRange,
    ) -> EngineResult<SeriesResponse> {
        // Memory tier: superset hit on the symbol's resolved window. The
        // engine applies its own freshness rule so fully closed ranges
        // never re-fetch, whatever their cache age.
        if let Some((entry, _)) = self.series_cache.get_any(&keys::series(symbol)) {
            if entry.value.covered.covers(&range)
                && self.series_is_fresh(entry.fetched_at, &range)
            {
                debug!(symbol, %range, "memory hit");
                return Ok(SeriesResponse {
                    series: entry.value.series.sub_range(&range),
                    stale: None,
                });
            }
        }

        let flight_key = keys::series_flight(symbol, &range);
        self.series_flight
            .run(&flight_key, || self.resolve_series_uncached(symbol, range))
            .await
    }

    /// Store-and-provider walk for a series miss. Runs inside the
    /// single-flight slot for its (symbol, range) key.
    async fn resolve_series_uncached(
        &self,
        symbol: &str,
        range: DateRange,
    ) -> EngineResult<SeriesResponse> {
        let lookup = self.store.get_series(symbol, &range).await?;

        let (base, base_fetched_at, gaps) = match lookup {
            SeriesLookup::Hit { series, fetched_at } => {
                if self.series_is_fresh(fetched_at, &range) {
                    debug!(symbol, %range, "store hit, promoting");
                    self.promote_series(symbol, &series, range, fetched_at);
                    return Ok(SeriesResponse {
                        series,
                        stale: None,
                    });
                }
                // Bars already closed when fetched are final; only the
                // tail from the fetch date forward can have changed.
                let tail_start = fetched_at.date_naive().max(range.start);
                let tail = DateRange::new(tail_start, range.end)?;
                debug!(symbol, %tail, "store hit is stale, refetching tail");
                (series, Some(fetched_at), vec![tail])
            }
            SeriesLookup::Partial {
                series,
                fetched_at,
                gaps,
            } => {
                debug!(symbol, ?gaps, "partial store hit, fetching gaps");
                (series, Some(fetched_at), gaps)
            }
            SeriesLookup::Miss => (PriceSeries::new(symbol), None, vec![range]),
        };

        let mut merged = base;
        for gap in &gaps {
            match self.provider.fetch_history(symbol, *gap).await {
                Ok(fetched) => {
                    merged = merged.merge(&fetched, self.options.merge_policy);
                    // The merged view already reflects the merge policy,
                    // so persisting it keeps store and response aligned.
                    self.store
                        .put_series(&merged.sub_range(gap), gap)
                        .await?;
                }
                Err(err) => {
                    if merged.is_empty() {
                        return Err(EngineError::from_provider(err));
                    }
                    warn!(symbol, %gap, error = %err, "refresh failed, serving stale series");
                    return Ok(SeriesResponse {
                        series: merged.sub_range(&range),
                        stale: Some(StaleInfo {
                            fetched_at: base_fetched_at.unwrap_or_else(Utc::now),
                            reason: err,
                        }),
                    });
                }
            }
        }

        let now = Utc::now();
        self.promote_series(symbol, &merged, range, now);
        Ok(SeriesResponse {
            series: merged.sub_range(&range),
            stale: None,
        })
    }

    /// A stored series is fresh when the whole range was already closed
    /// at fetch time (closed bars never change), or the fetch is inside
    /// the HISTORICAL window.
    fn series_is_fresh(&self, fetched_at: DateTime<Utc>, range: &DateRange) -> bool {
        if range.end < fetched_at.date_naive() {
            return true;
        }
        Utc::now() - fetched_at < self.options.freshness.ttl(TtlClass::Historical)
    }

    fn promote_series(
        &self,
        symbol: &str,
        series: &PriceSeries,
        covered: DateRange,
        fetched_at: DateTime<Utc>,
    ) {
        self.series_cache.put(
            keys::series(symbol),
            CacheEntry::with_fetched_at(
                SeriesSlot {
                    series: series.clone(),
                    covered,
                },
                fetched_at,
                TtlClass::Historical,
            ),
        );
    }

    // ------------------------------------------------------------------
    // Quotes
    // ------------------------------------------------------------------

    /// Resolve a live quote, serving the memory tier within the LIVE
    /// window and falling back to an annotated stale quote when the
    /// provider chain fails.
    pub async fn get_live_quote(&self, symbol: &str) -> EngineResult<QuoteResponse> {
        let key = keys::quote(symbol);
        if let Some(entry) = self.quote_cache.get(&key) {
            debug!(symbol, "quote memory hit");
            return Ok(QuoteResponse {
                bar: entry.value,
                stale: None,
            });
        }

        self.quote_flight
            .run(&key, || async {
                match self.provider.fetch_quote(symbol).await {
                    Ok(bar) => {
                        self.quote_cache
                            .put(keys::quote(symbol), CacheEntry::new(bar.clone(), TtlClass::Live));
                        Ok(QuoteResponse { bar, stale: None })
                    }
                    Err(err) => {
                        // The expired entry is logically evicted but still
                        // reachable as an explicit stale fallback.
                        if let Some((entry, _)) = self.quote_cache.get_any(&keys::quote(symbol)) {
                            warn!(symbol, error = %err, "quote refresh failed, serving stale");
                            return Ok(QuoteResponse {
                                bar: entry.value,
                                stale: Some(StaleInfo {
                                    fetched_at: entry.fetched_at,
                                    reason: err,
                                }),
                            });
                        }
                        Err(EngineError::from_provider(err))
                    }
                }
            })
            .await
    }

    // ------------------------------------------------------------------
    // Metrics
    // ------------------------------------------------------------------

    /// Risk metrics for one symbol over a range.
    pub async fn get_symbol_metrics(
        &self,
        symbol: &str,
        range: DateRange,
        risk_free_rate: Option<f64>,
    ) -> EngineResult<AnalysisResult> {
        let rate = risk_free_rate.unwrap_or(self.options.risk_free_rate);
        let constituents = vec![(symbol.to_string(), 1.0)];
        let key = analysis_key(&constituents, &range, rate);
        let symbols = vec![symbol.to_string()];

        if let Some(cached) = self.cached_analysis(&key, &symbols).await? {
            return Ok(cached);
        }

        let response = self.get_historical_series(symbol, range).await?;
        let metrics = analyze_symbol(&response.series, rate)?;
        let result = AnalysisResult {
            key: key.clone(),
            computed_at: Utc::now(),
            metrics,
        };
        self.store.put_analysis(&result, &symbols).await?;
        self.analysis_cache
            .put(key, CacheEntry::new(result.clone(), TtlClass::Analysis));
        Ok(result)
    }

    /// Risk metrics for a dollar-weighted portfolio, including the
    /// constituent correlation matrix.
    pub async fn get_portfolio_metrics(
        &self,
        allocation: &PortfolioAllocation,
        range: DateRange,
        risk_free_rate: Option<f64>,
    ) -> EngineResult<AnalysisResult> {
        let weights = allocation.weights()?;
        let rate = risk_free_rate.unwrap_or(self.options.risk_free_rate);
        let key = analysis_key(&weights, &range, rate);
        let symbols: Vec<String> = weights.iter().map(|(s, _)| s.clone()).collect();

        if let Some(cached) = self.cached_analysis(&key, &symbols).await? {
            return Ok(cached);
        }

        let responses = try_join_all(
            symbols
                .iter()
                .map(|symbol| self.get_historical_series(symbol, range)),
        )
        .await?;
        let series: Vec<PriceSeries> = responses.into_iter().map(|r| r.series).collect();

        let metrics = analyze_portfolio(
            &series,
            &weights,
            rate,
            self.options.min_correlation_overlap,
        )?;
        let result = AnalysisResult {
            key: key.clone(),
            computed_at: Utc::now(),
            metrics,
        };
        self.store.put_analysis(&result, &symbols).await?;
        self.analysis_cache
            .put(key, CacheEntry::new(result.clone(), TtlClass::Analysis));
        info!(symbols = symbols.len(), "portfolio metrics computed");
        Ok(result)
    }

    /// Check the analysis tiers for a fresh result whose backing series
    /// have not been refreshed since it was computed.
    async fn cached_analysis(
        &self,
        key: &str,
        symbols: &[String],
    ) -> EngineResult<Option<AnalysisResult>> {
        let mut latest_write: Option<DateTime<Utc>> = None;
        for symbol in symbols {
            if let Some(at) = self.store.last_series_write(symbol).await? {
                latest_write = Some(latest_write.map_or(at, |cur| cur.max(at)));
            }
        }
        let superseded = |computed_at: DateTime<Utc>| {
            latest_write.is_some_and(|write| write > computed_at)
        };

        if let Some(entry) = self.analysis_cache.get(key) {
            if !superseded(entry.value.computed_at) {
                debug!(key, "analysis memory hit");
                return Ok(Some(entry.value));
            }
        }

        if let Some(result) = self.store.get_analysis(key).await? {
            let age = Utc::now() - result.computed_at;
            if age < self.options.freshness.ttl(TtlClass::Analysis)
                && !superseded(result.computed_at)
            {
                debug!(key, "analysis store hit, promoting");
                self.analysis_cache.put(
                    key.to_string(),
                    CacheEntry::with_fetched_at(
                        result.clone(),
                        result.computed_at,
                        TtlClass::Analysis,
                    ),
                );
                return Ok(Some(result));
            }
        }
        Ok(None)
    }

    // ------------------------------------------------------------------
    // P&L, search, invalidation
    // ------------------------------------------------------------------

    /// Value open positions against live quotes:
    /// `current_price * quantity - cost_basis`.
    pub async fn get_portfolio_pnl(
        &self,
        positions: &[PositionInput],
    ) -> EngineResult<Vec<PositionPnl>> {
        let quotes = try_join_all(
            positions
                .iter()
                .map(|p| self.get_live_quote(&p.symbol)),
        )
        .await?;

        positions
            .iter()
            .zip(quotes)
            .map(|(position, quote)| {
                let price = Decimal::try_from(quote.bar.close).map_err(|_| {
                    EngineError::Internal(format!(
                        "quote price {} for {} is not representable",
                        quote.bar.close, position.symbol
                    ))
                })?;
                Ok(position_pnl(
                    &position.symbol,
                    price,
                    position.quantity,
                    position.cost_basis,
                    quote.stale.is_some(),
                ))
            })
            .collect()
    }

    /// Search for symbols across the provider chain.
    pub async fn search_symbols(&self, query: &str) -> EngineResult<Vec<SymbolMatch>> {
        self.provider
            .search_symbols(query)
            .await
            .map_err(EngineError::from_provider)
    }

    /// Clear cached data for one symbol, or everything. Returns the
    /// number of entries cleared across both tiers.
    pub async fn invalidate_cache(&self, symbol: Option<&str>) -> EngineResult<usize> {
        let cleared = match symbol {
            Some(symbol) => {
                let memory = self.series_cache.invalidate_prefix(&keys::series(symbol))
                    + self.quote_cache.invalidate_prefix(&keys::quote(symbol))
                    // Analysis fingerprints are opaque; drop the whole
                    // memory tier rather than leaving entries that mix
                    // in the invalidated symbol.
                    + self.analysis_cache.invalidate_all();
                memory + self.store.invalidate_symbol(symbol).await?
            }
            None => {
                let memory = self.series_cache.invalidate_all()
                    + self.quote_cache.invalidate_all()
                    + self.analysis_cache.invalidate_all();
                memory + self.store.invalidate_all().await?
            }
        };
        info!(?symbol, cleared, "cache invalidated");
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Days, Duration as ChronoDuration, NaiveDate};
    use riskdesk_core::{AllocationLine, ProviderError, StoreError};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn r(start: &str, end: &str) -> DateRange {
        DateRange::new(d(start), d(end)).unwrap()
    }

    fn synthetic_series(symbol: &str, range: &DateRange) -> PriceSeries {
        let mut bars = Vec::new();
        let mut date = range.start;
        let mut i = 0u64;
        while date <= range.end {
            let close = 100.0 + ((i as f64) * 0.7).sin() * 5.0;
            bars.push(PriceBar::new(symbol, date, close, close + 1.0, close - 1.0, close, 1000));
            date = date.checked_add_days(Days::new(1)).unwrap();
            i += 1;
        }
        PriceSeries::from_bars(symbol, bars)
    }

    struct MockProvider {
        history_calls: AtomicUsize,
        quote_calls: AtomicUsize,
        requested: Mutex<Vec<(String, DateRange)>>,
        fail: Mutex<Option<ProviderError>>,
    }

    impl MockProvider {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                history_calls: AtomicUsize::new(0),
                quote_calls: AtomicUsize::new(0),
                requested: Mutex::new(Vec::new()),
                fail: Mutex::new(None),
            })
        }

        fn fail_with(&self, err: ProviderError) {
            *self.fail.lock().unwrap() = Some(err);
        }

        fn recover(&self) {
            *self.fail.lock().unwrap() = None;
        }

        fn history_calls(&self) -> usize {
            self.history_calls.load(Ordering::SeqCst)
        }

        fn quote_calls(&self) -> usize {
            self.quote_calls.load(Ordering::SeqCst)
        }

        fn requested(&self) -> Vec<(String, DateRange)> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QuoteProvider for MockProvider {
        async fn fetch_history(
            &self,
            symbol: &str,
            range: DateRange,
        ) -> Result<PriceSeries, ProviderError> {
            self.history_calls.fetch_add(1, Ordering::SeqCst);
            self.requested
                .lock()
                .unwrap()
                .push((symbol.to_string(), range));
            if let Some(err) = self.fail.lock().unwrap().clone() {
                return Err(err);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(synthetic_series(symbol, &range))
        }

        async fn fetch_quote(&self, symbol: &str) -> Result<PriceBar, ProviderError> {
            self.quote_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.fail.lock().unwrap().clone() {
                return Err(err);
            }
            Ok(PriceBar::new(
                symbol,
                Utc::now().date_naive(),
                149.0,
                151.0,
                148.0,
                150.0,
                5000,
            ))
        }

        async fn search_symbols(&self, _query: &str) -> Result<Vec<SymbolMatch>, ProviderError> {
            Ok(Vec::new())
        }

        fn id(&self) -> &str {
            "mock"
        }
    }

    #[derive(Default)]
    struct MockStore {
        series: Mutex<HashMap<String, (PriceSeries, DateRange, DateTime<Utc>)>>,
        analysis: Mutex<HashMap<String, AnalysisResult>>,
    }

    impl MockStore {
        fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn seed(&self, series: PriceSeries, covered: DateRange, fetched_at: DateTime<Utc>) {
            self.series
                .lock()
                .unwrap()
                .insert(series.symbol.clone(), (series, covered, fetched_at));
        }
    }

    #[async_trait]
    impl PriceStore for MockStore {
        async fn get_series(
            &self,
            symbol: &str,
            range: &DateRange,
        ) -> Result<SeriesLookup, StoreError> {
            let map = self.series.lock().unwrap();
            let Some((series, covered, fetched_at)) = map.get(symbol) else {
                return Ok(SeriesLookup::Miss);
            };
            if covered.intersect(range).is_none() {
                return Ok(SeriesLookup::Miss);
            }
            let gaps = range.subtract(&[*covered]);
            let sub = series.sub_range(range);
            if gaps.is_empty() {
                Ok(SeriesLookup::Hit {
                    series: sub,
                    fetched_at: *fetched_at,
                })
            } else {
                Ok(SeriesLookup::Partial {
                    series: sub,
                    fetched_at: *fetched_at,
                    gaps,
                })
            }
        }

        async fn put_series(
            &self,
            series: &PriceSeries,
            covered: &DateRange,
        ) -> Result<(), StoreError> {
            let mut map = self.series.lock().unwrap();
            let entry = map
                .entry(series.symbol.clone())
                .or_insert_with(|| (PriceSeries::new(&series.symbol), *covered, Utc::now()));
            entry.0 = entry.0.merge(series, MergePolicy::FreshestWins);
            entry.1 = DateRange {
                start: entry.1.start.min(covered.start),
                end: entry.1.end.max(covered.end),
            };
            entry.2 = Utc::now();
            Ok(())
        }

        async fn last_series_write(
            &self,
            symbol: &str,
        ) -> Result<Option<DateTime<Utc>>, StoreError> {
            Ok(self.series.lock().unwrap().get(symbol).map(|(_, _, at)| *at))
        }

        async fn get_analysis(&self, key: &str) -> Result<Option<AnalysisResult>, StoreError> {
            Ok(self.analysis.lock().unwrap().get(key).cloned())
        }

        async fn put_analysis(
            &self,
            result: &AnalysisResult,
            _symbols: &[String],
        ) -> Result<(), StoreError> {
            self.analysis
                .lock()
                .unwrap()
                .insert(result.key.clone(), result.clone());
            Ok(())
        }

        async fn invalidate_symbol(&self, symbol: &str) -> Result<usize, StoreError> {
            let removed = self.series.lock().unwrap().remove(symbol).is_some() as usize;
            Ok(removed)
        }

        async fn invalidate_all(&self) -> Result<usize, StoreError> {
            let mut series = self.series.lock().unwrap();
            let mut analysis = self.analysis.lock().unwrap();
            let count = series.len() + analysis.len();
            series.clear();
            analysis.clear();
            Ok(count)
        }
    }

    fn engine(provider: Arc<MockProvider>, store: Arc<MockStore>) -> MarketDataEngine {
        MarketDataEngine::new(provider, store, EngineOptions::default())
    }

    #[tokio::test]
    async fn test_cold_fetch_is_sorted_with_unique_dates() {
        let provider = MockProvider::new();
        let store = MockStore::new();
        let engine = engine(provider.clone(), store);

        let range = r("2024-01-01", "2024-01-10");
        let response = engine.get_historical_series("AAPL", range).await.unwrap();

        assert!(response.stale.is_none());
        let dates = response.series.dates();
        let mut sorted = dates.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(dates, sorted);
        assert_eq!(provider.history_calls(), 1);
    }

    #[tokio::test]
    async fn test_second_request_is_a_cache_hit() {
        let provider = MockProvider::new();
        let store = MockStore::new();
        let engine = engine(provider.clone(), store);

        let range = r("2024-01-01", "2024-01-10");
        let first = engine.get_historical_series("AAPL", range).await.unwrap();
        let second = engine.get_historical_series("AAPL", range).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.history_calls(), 1, "second call must not re-fetch");
    }

    #[tokio::test]
    async fn test_subrange_request_hits_the_memory_superset() {
        let provider = MockProvider::new();
        let store = MockStore::new();
        let engine = engine(provider.clone(), store);

        engine
            .get_historical_series("AAPL", r("2024-01-01", "2024-03-31"))
            .await
            .unwrap();
        let sub = engine
            .get_historical_series("AAPL", r("2024-02-01", "2024-02-15"))
            .await
            .unwrap();

        assert_eq!(provider.history_calls(), 1);
        assert_eq!(sub.series.first().unwrap().date, d("2024-02-01"));
        assert_eq!(sub.series.last().unwrap().date, d("2024-02-15"));
    }

    #[tokio::test]
    async fn test_concurrent_cold_requests_coalesce() {
        let provider = MockProvider::new();
        let store = MockStore::new();
        let engine = Arc::new(engine(provider.clone(), store));

        let range = r("2024-01-01", "2024-01-31");
        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                engine.get_historical_series("AAPL", range).await
            }));
        }

        let mut responses = Vec::new();
        for handle in handles {
            responses.push(handle.await.unwrap().unwrap());
        }
        assert_eq!(provider.history_calls(), 1, "concurrent misses must coalesce");
        for response in &responses[1..] {
            assert_eq!(response.series, responses[0].series);
        }
    }

    #[tokio::test]
    async fn test_partial_store_hit_fetches_only_the_gap() {
        let provider = MockProvider::new();
        let store = MockStore::new();
        let covered = r("2024-01-01", "2024-06-30");
        store.seed(synthetic_series("AAPL", &covered), covered, Utc::now());
        let engine = engine(provider.clone(), store);

        let request = r("2024-01-01", "2024-09-30");
        let response = engine.get_historical_series("AAPL", request).await.unwrap();

        assert!(response.stale.is_none());
        assert_eq!(
            provider.requested(),
            vec![("AAPL".to_string(), r("2024-07-01", "2024-09-30"))],
            "only the uncovered gap may be fetched"
        );
        assert_eq!(response.series.first().unwrap().date, d("2024-01-01"));
        assert_eq!(response.series.last().unwrap().date, d("2024-09-30"));
    }

    #[tokio::test]
    async fn test_closed_range_never_refetches_regardless_of_age() {
        let provider = MockProvider::new();
        let store = MockStore::new();
        let covered = r("2024-01-01", "2024-06-30");
        // Fetched long after the range closed, and long ago.
        let fetched_at = Utc::now() - ChronoDuration::days(90);
        store.seed(synthetic_series("AAPL", &covered), covered, fetched_at);
        let engine = engine(provider.clone(), store);

        let response = engine.get_historical_series("AAPL", covered).await.unwrap();
        assert!(response.stale.is_none());
        assert_eq!(provider.history_calls(), 0, "closed bars are final");
    }

    #[tokio::test]
    async fn test_stale_open_range_refetches_the_tail_only() {
        let provider = MockProvider::new();
        let store = MockStore::new();
        let today = Utc::now().date_naive();
        let start = today.checked_sub_days(Days::new(30)).unwrap();
        let covered = DateRange::new(start, today).unwrap();
        let fetched_at = Utc::now() - ChronoDuration::hours(25);
        store.seed(synthetic_series("AAPL", &covered), covered, fetched_at);
        let engine = engine(provider.clone(), store);

        let response = engine.get_historical_series("AAPL", covered).await.unwrap();
        assert!(response.stale.is_none());

        let requested = provider.requested();
        assert_eq!(requested.len(), 1, "exactly one refetch");
        let tail = requested[0].1;
        assert_eq!(tail.start, fetched_at.date_naive(), "refetch starts at the stale boundary");
        assert_eq!(tail.end, today);
    }

    #[tokio::test]
    async fn test_provider_failure_with_cached_bars_serves_annotated_stale() {
        let provider = MockProvider::new();
        let store = MockStore::new();
        let today = Utc::now().date_naive();
        let start = today.checked_sub_days(Days::new(30)).unwrap();
        let covered = DateRange::new(start, today).unwrap();
        let fetched_at = Utc::now() - ChronoDuration::hours(25);
        store.seed(synthetic_series("AAPL", &covered), covered, fetched_at);

        provider.fail_with(ProviderError::Transient {
            provider: "mock".to_string(),
            message: "502".to_string(),
        });
        let engine = engine(provider.clone(), store);

        let response = engine.get_historical_series("AAPL", covered).await.unwrap();
        let stale = response.stale.expect("staleness must be surfaced");
        assert_eq!(stale.fetched_at, fetched_at);
        assert!(matches!(stale.reason, ProviderError::Transient { .. }));
        assert!(!response.series.is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_without_cache_propagates_typed_error() {
        let provider = MockProvider::new();
        let store = MockStore::new();
        provider.fail_with(ProviderError::RateLimited {
            provider: "mock".to_string(),
        });
        let engine = engine(provider.clone(), store);

        let err = engine
            .get_historical_series("AAPL", r("2024-01-01", "2024-01-31"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Provider(ProviderError::RateLimited { .. })
        ));

        provider.fail_with(ProviderError::SymbolNotFound("ZZZZ".to_string()));
        let err = engine
            .get_historical_series("ZZZZ", r("2024-01-01", "2024-01-31"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_symbol_metrics_cached_by_fingerprint() {
        let provider = MockProvider::new();
        let store = MockStore::new();
        let engine = engine(provider.clone(), store.clone());
        let range = r("2024-01-01", "2024-03-31");

        let first = engine
            .get_symbol_metrics("AAPL", range, Some(0.02))
            .await
            .unwrap();
        let second = engine
            .get_symbol_metrics("AAPL", range, Some(0.02))
            .await
            .unwrap();

        assert_eq!(first, second, "identical request must hit the analysis cache");
        assert_eq!(provider.history_calls(), 1);
        assert!(store.analysis.lock().unwrap().contains_key(&first.key));
        assert!(first.metrics.volatility > 0.0);
        assert!(first.metrics.sharpe_ratio.is_some());
    }

    #[tokio::test]
    async fn test_analysis_superseded_by_series_refresh() {
        let provider = MockProvider::new();
        let store = MockStore::new();
        let engine = engine(provider.clone(), store.clone());
        let range = r("2024-01-01", "2024-03-31");

        let first = engine
            .get_symbol_metrics("AAPL", range, Some(0.02))
            .await
            .unwrap();

        // A later series write supersedes the cached analysis even though
        // its 24h window has not elapsed.
        tokio::time::sleep(Duration::from_millis(5)).await;
        store
            .put_series(&synthetic_series("AAPL", &range), &range)
            .await
            .unwrap();

        let second = engine
            .get_symbol_metrics("AAPL", range, Some(0.02))
            .await
            .unwrap();
        assert!(second.computed_at > first.computed_at);
    }

    #[tokio::test]
    async fn test_portfolio_metrics_with_correlation_matrix() {
        let provider = MockProvider::new();
        let store = MockStore::new();
        let engine = engine(provider.clone(), store);

        let allocation = PortfolioAllocation::new(vec![
            AllocationLine { symbol: "AAPL".to_string(), dollars: dec!(50000) },
            AllocationLine { symbol: "GOOGL".to_string(), dollars: dec!(30000) },
            AllocationLine { symbol: "BND".to_string(), dollars: dec!(20000) },
        ])
        .unwrap();

        let result = engine
            .get_portfolio_metrics(&allocation, r("2024-01-01", "2024-03-31"), None)
            .await
            .unwrap();

        assert_eq!(provider.history_calls(), 3, "one fetch per constituent");
        let matrix = result.metrics.correlation.expect("portfolio gets a matrix");
        assert_eq!(matrix.symbols.len(), 3);
        assert_eq!(matrix.get("AAPL", "AAPL"), Some(1.0));
        assert_eq!(matrix.get("AAPL", "BND"), matrix.get("BND", "AAPL"));
    }

    #[tokio::test]
    async fn test_portfolio_metrics_zero_dollars_is_validation_error() {
        let provider = MockProvider::new();
        let store = MockStore::new();
        let engine = engine(provider.clone(), store);

        let allocation = PortfolioAllocation::new(vec![
            AllocationLine { symbol: "AAPL".to_string(), dollars: dec!(0) },
            AllocationLine { symbol: "GOOGL".to_string(), dollars: dec!(0) },
        ])
        .unwrap();

        let err = engine
            .get_portfolio_metrics(&allocation, r("2024-01-01", "2024-03-31"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(provider.history_calls(), 0);
    }

    #[tokio::test]
    async fn test_live_quote_served_from_memory_within_ttl() {
        let provider = MockProvider::new();
        let store = MockStore::new();
        let engine = engine(provider.clone(), store);

        let first = engine.get_live_quote("AAPL").await.unwrap();
        let second = engine.get_live_quote("AAPL").await.unwrap();

        assert_eq!(first.bar, second.bar);
        assert!(first.stale.is_none());
        assert_eq!(provider.quote_calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_quote_refresh_failure_serves_stale() {
        let provider = MockProvider::new();
        let store = MockStore::new();
        // Live TTL of zero: every cached quote is immediately expired.
        let options = EngineOptions {
            freshness: FreshnessPolicy::from_secs(0, 86400, 86400),
            ..EngineOptions::default()
        };
        let engine = MarketDataEngine::new(provider.clone(), store, options);

        engine.get_live_quote("AAPL").await.unwrap();
        provider.fail_with(ProviderError::Timeout {
            provider: "mock".to_string(),
        });

        let response = engine.get_live_quote("AAPL").await.unwrap();
        let stale = response.stale.expect("stale quote must be annotated");
        assert!(matches!(stale.reason, ProviderError::Timeout { .. }));
        assert_eq!(response.bar.close, 150.0);
    }

    #[tokio::test]
    async fn test_portfolio_pnl_from_quotes() {
        let provider = MockProvider::new();
        let store = MockStore::new();
        let engine = engine(provider.clone(), store);

        let positions = vec![
            PositionInput {
                symbol: "AAPL".to_string(),
                quantity: dec!(10),
                cost_basis: dec!(1200),
            },
            PositionInput {
                symbol: "GOOGL".to_string(),
                quantity: dec!(2),
                cost_basis: dec!(400),
            },
        ];

        let pnl = engine.get_portfolio_pnl(&positions).await.unwrap();
        // mock quote closes at 150.0
        assert_eq!(pnl[0].pnl, dec!(300));
        assert_eq!(pnl[1].pnl, dec!(-100));
        assert!(!pnl[0].stale);
    }

    #[tokio::test]
    async fn test_invalidate_symbol_forces_refetch() {
        let provider = MockProvider::new();
        let store = MockStore::new();
        let engine = engine(provider.clone(), store);
        let range = r("2024-01-01", "2024-01-31");

        engine.get_historical_series("AAPL", range).await.unwrap();
        assert_eq!(provider.history_calls(), 1);

        let cleared = engine.invalidate_cache(Some("AAPL")).await.unwrap();
        assert!(cleared > 0);

        engine.get_historical_series("AAPL", range).await.unwrap();
        assert_eq!(provider.history_calls(), 2, "invalidation must force a refetch");
    }

    #[tokio::test]
    async fn test_end_to_end_with_sqlite_store() {
        let provider = MockProvider::new();
        let store = Arc::new(riskdesk_store::SqliteStore::open_in_memory().unwrap());
        let engine = MarketDataEngine::new(provider.clone(), store, EngineOptions::default());
        let range = r("2024-01-01", "2024-02-29");

        let first = engine.get_historical_series("AAPL", range).await.unwrap();
        assert!(!first.series.is_empty());

        // Served from cache tiers on repeat, and extended by a gap fetch
        // when the range grows.
        let second = engine.get_historical_series("AAPL", range).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(provider.history_calls(), 1);

        let wider = r("2024-01-01", "2024-03-31");
        let extended = engine.get_historical_series("AAPL", wider).await.unwrap();
        assert_eq!(provider.history_calls(), 2);
        assert_eq!(
            provider.requested()[1],
            ("AAPL".to_string(), r("2024-03-01", "2024-03-31"))
        );
        assert_eq!(extended.series.last().unwrap().date, d("2024-03-31"));
    }

    #[tokio::test]
    async fn test_invalidate_all_reports_cleared_count() {
        let provider = MockProvider::new();
        let store = MockStore::new();
        let engine = engine(provider.clone(), store);

        engine
            .get_historical_series("AAPL", r("2024-01-01", "2024-01-31"))
            .await
            .unwrap();
        engine.get_live_quote("GOOGL").await.unwrap();

        let cleared = engine.invalidate_cache(None).await.unwrap();
        // at least: one memory series slot, one memory quote, one store row
        assert!(cleared >= 3);
    }
}
