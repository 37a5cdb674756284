//! Command implementations.

pub mod history;
pub mod invalidate;
pub mod metrics;
pub mod portfolio;
pub mod quote;
pub mod search;
pub mod validate;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use riskdesk_config::AppConfig;
use riskdesk_core::{DateRange, FreshnessPolicy, QuoteProvider, StaleInfo};
use riskdesk_engine::{EngineOptions, MarketDataEngine};
use riskdesk_providers::{
    AlphaVantageConfig, AlphaVantageProvider, FailoverProvider, RateLimitConfig, RateLimiter,
    YahooConfig, YahooProvider,
};
use riskdesk_store::SqliteStore;

pub(crate) fn load(config_path: &Path) -> Result<AppConfig> {
    riskdesk_config::load_config(config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))
}

/// Wire the provider chain, store, and engine from configuration.
pub(crate) fn build_engine(config: &AppConfig) -> Result<MarketDataEngine> {
    let av_settings = &config.providers.alpha_vantage;
    let api_key = std::env::var(&av_settings.api_key_env)
        .with_context(|| format!("{} is not set", av_settings.api_key_env))?;
    let alpha = Arc::new(AlphaVantageProvider::new(AlphaVantageConfig {
        api_key,
        base_url: av_settings.base_url.clone(),
        timeout: Duration::from_secs(10),
    })?) as Arc<dyn QuoteProvider>;

    let yahoo = Arc::new(YahooProvider::new(YahooConfig {
        base_url: config.providers.yahoo.base_url.clone(),
        timeout: Duration::from_secs(10),
    })?) as Arc<dyn QuoteProvider>;

    let limiter = RateLimiter::new()
        .configure(
            alpha.id(),
            RateLimitConfig {
                requests_per_minute: av_settings.requests_per_minute,
                burst_capacity: av_settings.burst_capacity,
            },
        )
        .configure(
            yahoo.id(),
            RateLimitConfig {
                requests_per_minute: config.providers.yahoo.requests_per_minute,
                burst_capacity: config.providers.yahoo.burst_capacity,
            },
        );

    let (primary, fallback) = match config.providers.primary.as_str() {
        "alpha_vantage" => (alpha, yahoo),
        "yahoo" => (yahoo, alpha),
        other => bail!("unknown primary provider: {}", other),
    };
    let provider = Arc::new(FailoverProvider::new(primary, fallback, limiter));

    if let Some(parent) = Path::new(&config.store.path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let store = Arc::new(SqliteStore::open(&config.store.path)?);

    let options = EngineOptions {
        freshness: FreshnessPolicy::from_secs(
            config.cache.live_ttl_secs,
            config.cache.historical_ttl_secs,
            config.cache.analysis_ttl_secs,
        ),
        merge_policy: config.cache.merge_policy,
        memory_capacity: config.cache.memory_capacity,
        fetch_wait: Duration::from_secs(config.cache.fetch_wait_secs),
        risk_free_rate: config.analytics.risk_free_rate,
        min_correlation_overlap: config.analytics.min_correlation_overlap,
    };

    tracing::debug!(
        primary = %config.providers.primary,
        store = %config.store.path,
        "engine initialized"
    );
    Ok(MarketDataEngine::new(provider, store, options))
}

pub(crate) fn parse_range(start: &str, end: &str) -> Result<DateRange> {
    let start = start
        .parse()
        .with_context(|| format!("invalid start date: {}", start))?;
    let end = end
        .parse()
        .with_context(|| format!("invalid end date: {}", end))?;
    Ok(DateRange::new(start, end)?)
}

/// Soft staleness goes to stderr so piped stdout stays clean data. The
/// warning is never silently dropped: data-but-stale and no-data-at-all
/// must render differently.
pub(crate) fn warn_stale(stale: &Option<StaleInfo>) {
    if let Some(info) = stale {
        eprintln!(
            "WARNING: showing stale data last fetched {} (refresh failed: {})",
            info.fetched_at.format("%Y-%m-%d %H:%M UTC"),
            info.reason
        );
    }
}
