//! Config validation command.

use std::path::Path;

use anyhow::Result;

pub async fn run(config_path: &Path) -> Result<()> {
    let config = super::load(config_path)?;

    println!("Configuration OK: {}", config_path.display());
    println!("  app:       {} ({})", config.app.name, config.app.environment);
    println!("  primary:   {}", config.providers.primary);
    println!("  store:     {}", config.store.path);
    println!(
        "  ttl:       live {}s / historical {}s / analysis {}s",
        config.cache.live_ttl_secs, config.cache.historical_ttl_secs, config.cache.analysis_ttl_secs
    );
    println!("  merge:     {:?}", config.cache.merge_policy);
    println!(
        "  analytics: rf {} / min overlap {}",
        config.analytics.risk_free_rate, config.analytics.min_correlation_overlap
    );

    let key_env = &config.providers.alpha_vantage.api_key_env;
    if std::env::var(key_env).is_err() {
        println!("  note:      {} is not set; alpha_vantage calls will fail", key_env);
    }
    Ok(())
}
