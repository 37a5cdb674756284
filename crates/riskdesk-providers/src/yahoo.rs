//! Yahoo Finance chart API client.
//!
//! The consumer-grade fallback. The chart endpoint needs no API key but
//! insists on a browser-ish User-Agent, reports unknown symbols inside a
//! JSON error object, and interleaves nulls into its price arrays on
//! halted days.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use reqwest::{header, Client};
use serde::Deserialize;
use tracing::debug;

use riskdesk_core::{
    DateRange, PriceBar, PriceSeries, ProviderError, QuoteProvider, SymbolMatch,
};

use crate::alpha_vantage::transport_error;

pub const PROVIDER_ID: &str = "yahoo";

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:120.0) Gecko/20100101 Firefox/120.0";

/// Yahoo client configuration.
#[derive(Debug, Clone)]
pub struct YahooConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query1.finance.yahoo.com".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteArrays>,
}

#[derive(Debug, Deserialize, Default)]
struct QuoteArrays {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    quotes: Vec<SearchQuote>,
}

#[derive(Debug, Deserialize)]
struct SearchQuote {
    symbol: Option<String>,
    #[serde(rename = "shortname")]
    short_name: Option<String>,
    exchange: Option<String>,
}

/// Yahoo Finance provider client.
pub struct YahooProvider {
    config: YahooConfig,
    client: Client,
}

impl YahooProvider {
    pub fn new(config: YahooConfig) -> Result<Self, ProviderError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::USER_AGENT, header::HeaderValue::from_static(USER_AGENT));
        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ProviderError::Transient {
                provider: PROVIDER_ID.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { config, client })
    }

    async fn fetch_chart(
        &self,
        symbol: &str,
        period1: i64,
        period2: i64,
    ) -> Result<Vec<PriceBar>, ProviderError> {
        let url = format!("{}/v8/finance/chart/{}", self.config.base_url, symbol);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
                ("events", "history".to_string()),
            ])
            .send()
            .await
            .map_err(|e| transport_error(e, PROVIDER_ID))?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }
        // Yahoo reports unknown symbols with a 404 wrapping a JSON error
        // body; decode the body before deciding.
        if status.is_server_error() {
            return Err(ProviderError::Transient {
                provider: PROVIDER_ID.to_string(),
                message: status.to_string(),
            });
        }

        let parsed: ChartResponse =
            resp.json().await.map_err(|e| ProviderError::Malformed {
                provider: PROVIDER_ID.to_string(),
                message: e.to_string(),
            })?;

        if let Some(err) = parsed.chart.error {
            debug!(provider = PROVIDER_ID, code = %err.code, "chart error");
            return Err(ProviderError::SymbolNotFound(format!(
                "{} ({})",
                symbol, err.description
            )));
        }
        let result = parsed
            .chart
            .result
            .and_then(|mut r| (!r.is_empty()).then(|| r.remove(0)))
            .ok_or_else(|| ProviderError::SymbolNotFound(symbol.to_string()))?;

        let timestamps = result.timestamp.unwrap_or_default();
        let quote = result
            .indicators
            .quote
            .into_iter()
            .next()
            .unwrap_or_default();

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, ts) in timestamps.iter().enumerate() {
            // Halted or partial days come through as nulls; skip them
            // rather than inventing bars.
            let (open, high, low, close) = match (
                quote.open.get(i).copied().flatten(),
                quote.high.get(i).copied().flatten(),
                quote.low.get(i).copied().flatten(),
                quote.close.get(i).copied().flatten(),
            ) {
                (Some(o), Some(h), Some(l), Some(c)) => (o, h, l, c),
                _ => continue,
            };
            let date = match DateTime::from_timestamp(*ts, 0) {
                Some(dt) => dt.date_naive(),
                None => continue,
            };
            bars.push(PriceBar::new(
                symbol,
                date,
                open,
                high,
                low,
                close,
                quote.volume.get(i).copied().flatten().unwrap_or(0),
            ));
        }
        Ok(bars)
    }
}

#[async_trait]
impl QuoteProvider for YahooProvider {
    async fn fetch_history(
        &self,
        symbol: &str,
        range: DateRange,
    ) -> Result<PriceSeries, ProviderError> {
        let start = range.start.and_time(NaiveTime::MIN).and_utc().timestamp();
        // period2 is exclusive; push it past the end date.
        let end = range
            .end
            .succ_opt()
            .unwrap_or(range.end)
            .and_time(NaiveTime::MIN)
            .and_utc()
            .timestamp();

        let bars = self.fetch_chart(symbol, start, end).await?;
        let filtered = bars.into_iter().filter(|b| range.contains(b.date)).collect();
        Ok(PriceSeries::from_bars(symbol, filtered))
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<PriceBar, ProviderError> {
        // Most recent daily bar via a one-week chart window.
        let now = Utc::now().timestamp();
        let week_ago = now - 7 * 24 * 3600;
        let bars = self.fetch_chart(symbol, week_ago, now).await?;
        bars.into_iter()
            .max_by_key(|b| b.date)
            .ok_or_else(|| ProviderError::Malformed {
                provider: PROVIDER_ID.to_string(),
                message: format!("no recent bars for {}", symbol),
            })
    }

    async fn search_symbols(&self, query: &str) -> Result<Vec<SymbolMatch>, ProviderError> {
        let url = format!("{}/v1/finance/search", self.config.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("q", query), ("quotesCount", "10"), ("newsCount", "0")])
            .send()
            .await
            .map_err(|e| transport_error(e, PROVIDER_ID))?;

        if resp.status().as_u16() == 429 {
            return Err(ProviderError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }
        if !resp.status().is_success() {
            return Err(ProviderError::Transient {
                provider: PROVIDER_ID.to_string(),
                message: resp.status().to_string(),
            });
        }

        let parsed: SearchResponse =
            resp.json().await.map_err(|e| ProviderError::Malformed {
                provider: PROVIDER_ID.to_string(),
                message: e.to_string(),
            })?;

        Ok(parsed
            .quotes
            .into_iter()
            .filter_map(|q| {
                Some(SymbolMatch {
                    symbol: q.symbol?,
                    name: q.short_name.unwrap_or_default(),
                    region: q.exchange,
                })
            })
            .collect())
    }

    fn id(&self) -> &str {
        PROVIDER_ID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_response_with_nulls() {
        let json = r#"{
            "chart": {
                "result": [{
                    "meta": {"symbol": "AAPL"},
                    "timestamp": [1704153600, 1704240000, 1704326400],
                    "indicators": {
                        "quote": [{
                            "open":   [185.0, null, 184.2],
                            "high":   [186.0, null, 185.9],
                            "low":    [183.0, null, 183.4],
                            "close":  [185.6, null, 184.3],
                            "volume": [82488700, null, 58414500]
                        }]
                    }
                }],
                "error": null
            }
        }"#;
        let parsed: ChartResponse = serde_json::from_str(json).unwrap();
        let result = &parsed.chart.result.as_ref().unwrap()[0];
        assert_eq!(result.timestamp.as_ref().unwrap().len(), 3);
        assert_eq!(result.indicators.quote[0].close[1], None);
    }

    #[test]
    fn test_chart_error_body() {
        let json = r#"{
            "chart": {
                "result": null,
                "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}
            }
        }"#;
        let parsed: ChartResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.chart.error.unwrap().code, "Not Found");
    }

    #[test]
    fn test_search_response_parses() {
        let json = r#"{
            "quotes": [
                {"symbol": "AAPL", "shortname": "Apple Inc.", "exchange": "NMS"},
                {"shortname": "headline without a symbol"}
            ]
        }"#;
        let parsed: SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.quotes.len(), 2);
        assert_eq!(parsed.quotes[0].symbol.as_deref(), Some("AAPL"));
    }
}
