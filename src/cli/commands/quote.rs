//! Quote command.

use std::path::Path;

use anyhow::Result;

use crate::cli::QuoteArgs;

pub async fn run(args: QuoteArgs, config_path: &Path) -> Result<()> {
    let config = super::load(config_path)?;
    let engine = super::build_engine(&config)?;

    let response = engine.get_live_quote(&args.symbol).await?;
    super::warn_stale(&response.stale);

    if args.output == "json" {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    let bar = &response.bar;
    println!("{} ({})", bar.symbol, bar.date);
    println!("  close  {:>12.2}", bar.close);
    println!("  open   {:>12.2}", bar.open);
    println!("  high   {:>12.2}", bar.high);
    println!("  low    {:>12.2}", bar.low);
    println!("  volume {:>12}", bar.volume);
    Ok(())
}
