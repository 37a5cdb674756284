//! Configuration structures.

use riskdesk_core::MergePolicy;
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub analytics: AnalyticsSettings,
    #[serde(default)]
    pub store: StoreSettings,
}

/// General app settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "riskdesk".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Market data provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Which provider leads the failover chain.
    pub primary: String,
    pub alpha_vantage: AlphaVantageSettings,
    pub yahoo: YahooSettings,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            primary: "alpha_vantage".to_string(),
            alpha_vantage: AlphaVantageSettings::default(),
            yahoo: YahooSettings::default(),
        }
    }
}

/// Alpha Vantage settings. The API key stays in the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlphaVantageSettings {
    pub api_key_env: String,
    pub base_url: String,
    pub requests_per_minute: u32,
    pub burst_capacity: f64,
}

impl Default for AlphaVantageSettings {
    fn default() -> Self {
        Self {
            api_key_env: "ALPHA_VANTAGE_API_KEY".to_string(),
            base_url: "https://www.alphavantage.co".to_string(),
            // free tier: 5 requests/minute
            requests_per_minute: 5,
            burst_capacity: 5.0,
        }
    }
}

/// Yahoo Finance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YahooSettings {
    pub base_url: String,
    pub requests_per_minute: u32,
    pub burst_capacity: f64,
}

impl Default for YahooSettings {
    fn default() -> Self {
        Self {
            base_url: "https://query1.finance.yahoo.com".to_string(),
            requests_per_minute: 60,
            burst_capacity: 10.0,
        }
    }
}

/// Cache tier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    pub live_ttl_secs: i64,
    pub historical_ttl_secs: i64,
    pub analysis_ttl_secs: i64,
    pub memory_capacity: usize,
    pub merge_policy: MergePolicy,
    /// Bounded wait for joining another request's in-flight fetch.
    pub fetch_wait_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            live_ttl_secs: 300,
            historical_ttl_secs: 86_400,
            analysis_ttl_secs: 86_400,
            memory_capacity: 256,
            merge_policy: MergePolicy::FreshestWins,
            fetch_wait_secs: 30,
        }
    }
}

/// Risk analytics defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsSettings {
    pub risk_free_rate: f64,
    pub min_correlation_overlap: usize,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.02,
            min_correlation_overlap: 30,
        }
    }
}

/// Persistent store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    pub path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: "data/riskdesk.db".to_string(),
        }
    }
}
