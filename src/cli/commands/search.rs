//! Symbol search command.

use std::path::Path;

use anyhow::Result;

use crate::cli::SearchArgs;

pub async fn run(args: SearchArgs, config_path: &Path) -> Result<()> {
    let config = super::load(config_path)?;
    let engine = super::build_engine(&config)?;

    let matches = engine.search_symbols(&args.query).await?;
    if matches.is_empty() {
        println!("no matches for {:?}", args.query);
        return Ok(());
    }

    for m in matches {
        println!(
            "{:<10} {:<40} {}",
            m.symbol,
            m.name,
            m.region.unwrap_or_default()
        );
    }
    Ok(())
}
