//! History command.

use std::path::Path;

use anyhow::Result;

use crate::cli::HistoryArgs;

pub async fn run(args: HistoryArgs, config_path: &Path) -> Result<()> {
    let config = super::load(config_path)?;
    let engine = super::build_engine(&config)?;
    let range = super::parse_range(&args.start, &args.end)?;

    let response = engine.get_historical_series(&args.symbol, range).await?;
    super::warn_stale(&response.stale);

    if args.output == "json" {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!(
        "{} bars for {} ({})",
        response.series.len(),
        args.symbol,
        range
    );
    println!(
        "{:<12} {:>10} {:>10} {:>10} {:>10} {:>12}",
        "date", "open", "high", "low", "close", "volume"
    );
    for bar in response.series.bars() {
        println!(
            "{:<12} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>12}",
            bar.date, bar.open, bar.high, bar.low, bar.close, bar.volume
        );
    }
    Ok(())
}
