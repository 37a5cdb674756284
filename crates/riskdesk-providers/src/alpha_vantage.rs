//! Alpha Vantage market data client.
//!
//! Free-tier quirks this client absorbs: quota exhaustion arrives as an
//! HTTP 200 with a "Note" or "Information" body, an unknown symbol as an
//! "Error Message" body, and every numeric field as a string.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use riskdesk_core::{
    DateRange, PriceBar, PriceSeries, ProviderError, QuoteProvider, SymbolMatch,
};

pub const PROVIDER_ID: &str = "alpha_vantage";

/// Alpha Vantage client configuration.
#[derive(Debug, Clone)]
pub struct AlphaVantageConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl AlphaVantageConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://www.alphavantage.co".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Read the API key from an environment variable.
    pub fn from_env(var: &str) -> Result<Self, ProviderError> {
        let api_key = std::env::var(var).map_err(|_| {
            ProviderError::InvalidRequest(format!("{} not set", var))
        })?;
        Ok(Self::new(api_key))
    }
}

#[derive(Debug, Deserialize)]
struct DailyResponse {
    #[serde(rename = "Time Series (Daily)")]
    series: Option<BTreeMap<String, DailyBar>>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DailyBar {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume")]
    volume: String,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(rename = "Global Quote")]
    quote: Option<GlobalQuote>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "02. open")]
    open: Option<String>,
    #[serde(rename = "03. high")]
    high: Option<String>,
    #[serde(rename = "04. low")]
    low: Option<String>,
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "06. volume")]
    volume: Option<String>,
    #[serde(rename = "07. latest trading day")]
    latest_trading_day: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "bestMatches")]
    best_matches: Option<Vec<SearchMatch>>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchMatch {
    #[serde(rename = "1. symbol")]
    symbol: String,
    #[serde(rename = "2. name")]
    name: String,
    #[serde(rename = "4. region")]
    region: Option<String>,
}

/// Alpha Vantage provider client.
pub struct AlphaVantageProvider {
    config: AlphaVantageConfig,
    client: Client,
}

impl AlphaVantageProvider {
    pub fn new(config: AlphaVantageConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::Transient {
                provider: PROVIDER_ID.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { config, client })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        params: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}/query", self.config.base_url);
        let resp = self
            .client
            .get(&url)
            .query(params)
            .query(&[("apikey", self.config.api_key.as_str())])
            .send()
            .await
            .map_err(|e| transport_error(e, PROVIDER_ID))?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Transient {
                provider: PROVIDER_ID.to_string(),
                message: format!("{}: {}", status, body),
            });
        }

        resp.json::<T>().await.map_err(|e| ProviderError::Malformed {
            provider: PROVIDER_ID.to_string(),
            message: e.to_string(),
        })
    }

    fn parse_price(field: &str, value: &str) -> Result<f64, ProviderError> {
        value.parse().map_err(|_| ProviderError::Malformed {
            provider: PROVIDER_ID.to_string(),
            message: format!("unparseable {}: {:?}", field, value),
        })
    }

    /// Quota-exhaustion bodies arrive with HTTP 200.
    fn quota_note(note: Option<String>, information: Option<String>) -> Option<ProviderError> {
        if let Some(msg) = note.or(information) {
            debug!(provider = PROVIDER_ID, %msg, "quota message from provider");
            return Some(ProviderError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }
        None
    }
}

#[async_trait]
impl QuoteProvider for AlphaVantageProvider {
    async fn fetch_history(
        &self,
        symbol: &str,
        range: DateRange,
    ) -> Result<PriceSeries, ProviderError> {
        let resp: DailyResponse = self
            .get_json(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", symbol),
                ("outputsize", "full"),
            ])
            .await?;

        if let Some(err) = Self::quota_note(resp.note, resp.information) {
            return Err(err);
        }
        if resp.error_message.is_some() {
            return Err(ProviderError::SymbolNotFound(symbol.to_string()));
        }
        let series = resp.series.ok_or_else(|| ProviderError::Malformed {
            provider: PROVIDER_ID.to_string(),
            message: "daily response missing time series".to_string(),
        })?;

        let mut bars = Vec::new();
        for (date_str, raw) in series {
            let date: NaiveDate = date_str.parse().map_err(|_| ProviderError::Malformed {
                provider: PROVIDER_ID.to_string(),
                message: format!("unparseable date: {:?}", date_str),
            })?;
            if !range.contains(date) {
                continue;
            }
            bars.push(PriceBar::new(
                symbol,
                date,
                Self::parse_price("open", &raw.open)?,
                Self::parse_price("high", &raw.high)?,
                Self::parse_price("low", &raw.low)?,
                Self::parse_price("close", &raw.close)?,
                raw.volume.parse().unwrap_or(0),
            ));
        }
        Ok(PriceSeries::from_bars(symbol, bars))
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<PriceBar, ProviderError> {
        let resp: QuoteResponse = self
            .get_json(&[("function", "GLOBAL_QUOTE"), ("symbol", symbol)])
            .await?;

        if let Some(err) = Self::quota_note(resp.note, resp.information) {
            return Err(err);
        }
        if resp.error_message.is_some() {
            return Err(ProviderError::SymbolNotFound(symbol.to_string()));
        }

        // An unknown symbol can also come back as an empty quote object.
        let quote = resp
            .quote
            .filter(|q| q.price.is_some())
            .ok_or_else(|| ProviderError::SymbolNotFound(symbol.to_string()))?;

        let date: NaiveDate = quote
            .latest_trading_day
            .as_deref()
            .and_then(|d| d.parse().ok())
            .ok_or_else(|| ProviderError::Malformed {
                provider: PROVIDER_ID.to_string(),
                message: "quote missing latest trading day".to_string(),
            })?;
        let close = Self::parse_price("price", quote.price.as_deref().unwrap_or_default())?;

        Ok(PriceBar::new(
            symbol,
            date,
            quote
                .open
                .as_deref()
                .and_then(|v| v.parse().ok())
                .unwrap_or(close),
            quote
                .high
                .as_deref()
                .and_then(|v| v.parse().ok())
                .unwrap_or(close),
            quote
                .low
                .as_deref()
                .and_then(|v| v.parse().ok())
                .unwrap_or(close),
            close,
            quote
                .volume
                .as_deref()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        ))
    }

    async fn search_symbols(&self, query: &str) -> Result<Vec<SymbolMatch>, ProviderError> {
        let resp: SearchResponse = self
            .get_json(&[("function", "SYMBOL_SEARCH"), ("keywords", query)])
            .await?;

        if let Some(err) = Self::quota_note(resp.note, resp.information) {
            return Err(err);
        }
        Ok(resp
            .best_matches
            .unwrap_or_default()
            .into_iter()
            .map(|m| SymbolMatch {
                symbol: m.symbol,
                name: m.name,
                region: m.region,
            })
            .collect())
    }

    fn id(&self) -> &str {
        PROVIDER_ID
    }
}

/// Map a reqwest failure into the provider taxonomy.
pub(crate) fn transport_error(err: reqwest::Error, provider: &str) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout {
            provider: provider.to_string(),
        }
    } else {
        ProviderError::Transient {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_response_parses_wire_format() {
        let json = r#"{
            "Meta Data": {"2. Symbol": "AAPL"},
            "Time Series (Daily)": {
                "2024-01-02": {
                    "1. open": "187.15", "2. high": "188.44",
                    "3. low": "183.89", "4. close": "185.64",
                    "5. volume": "82488700"
                },
                "2024-01-03": {
                    "1. open": "184.22", "2. high": "185.88",
                    "3. low": "183.43", "4. close": "184.25",
                    "5. volume": "58414500"
                }
            }
        }"#;
        let resp: DailyResponse = serde_json::from_str(json).unwrap();
        let series = resp.series.unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series["2024-01-02"].close, "185.64");
    }

    #[test]
    fn test_quota_body_is_rate_limited() {
        let json = r#"{"Note": "Our standard API rate limit is 25 requests per day."}"#;
        let resp: DailyResponse = serde_json::from_str(json).unwrap();
        let err = AlphaVantageProvider::quota_note(resp.note, resp.information).unwrap();
        assert!(matches!(err, ProviderError::RateLimited { .. }));
    }

    #[test]
    fn test_error_message_body_parses() {
        let json = r#"{"Error Message": "Invalid API call."}"#;
        let resp: DailyResponse = serde_json::from_str(json).unwrap();
        assert!(resp.error_message.is_some());
        assert!(resp.series.is_none());
    }

    #[test]
    fn test_empty_global_quote_means_unknown_symbol() {
        let json = r#"{"Global Quote": {}}"#;
        let resp: QuoteResponse = serde_json::from_str(json).unwrap();
        assert!(resp.quote.unwrap().price.is_none());
    }
}
