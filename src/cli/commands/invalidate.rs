//! Cache invalidation command.

use std::path::Path;

use anyhow::{bail, Result};

use crate::cli::InvalidateArgs;

pub async fn run(args: InvalidateArgs, config_path: &Path) -> Result<()> {
    let config = super::load(config_path)?;
    let engine = super::build_engine(&config)?;

    let cleared = match (&args.symbol, args.all) {
        (Some(symbol), false) => engine.invalidate_cache(Some(symbol)).await?,
        (None, true) => engine.invalidate_cache(None).await?,
        _ => bail!("specify either --symbol SYM or --all"),
    };

    println!("cleared {} cache entries", cleared);
    Ok(())
}
