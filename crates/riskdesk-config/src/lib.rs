//! Configuration management.

mod settings;

pub use settings::{
    AlphaVantageSettings, AnalyticsSettings, AppConfig, AppSettings, CacheSettings,
    LoggingConfig, ProvidersConfig, StoreSettings, YahooSettings,
};

use config::{Config, ConfigError, Environment, File};
use std::path::Path;

/// Load configuration from file and environment.
///
/// Environment variables prefixed `RISKDESK__` override file values,
/// e.g. `RISKDESK__CACHE__LIVE_TTL_SECS=60`.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(
            Environment::with_prefix("RISKDESK")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize()
}
