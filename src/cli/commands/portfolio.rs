//! Portfolio metrics command.

use std::path::Path;

use anyhow::{bail, Context, Result};
use riskdesk_core::{AllocationLine, PortfolioAllocation};

use crate::cli::PortfolioArgs;

/// Parse "AAPL=50000,GOOGL=30000" into allocation lines.
fn parse_allocations(input: &str) -> Result<PortfolioAllocation> {
    let mut lines = Vec::new();
    for part in input.split(',') {
        let Some((symbol, dollars)) = part.split_once('=') else {
            bail!("bad allocation {:?}, expected SYMBOL=DOLLARS", part);
        };
        lines.push(AllocationLine {
            symbol: symbol.trim().to_string(),
            dollars: dollars
                .trim()
                .parse()
                .with_context(|| format!("bad dollar amount in {:?}", part))?,
        });
    }
    Ok(PortfolioAllocation::new(lines)?)
}

pub async fn run(args: PortfolioArgs, config_path: &Path) -> Result<()> {
    let config = super::load(config_path)?;
    let engine = super::build_engine(&config)?;
    let range = super::parse_range(&args.start, &args.end)?;
    let allocation = parse_allocations(&args.allocations)?;

    let result = engine
        .get_portfolio_metrics(&allocation, range, args.risk_free_rate)
        .await?;

    if args.output == "json" {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("Portfolio metrics ({})", range);
    println!("  weights:");
    for (symbol, weight) in allocation.weights()? {
        println!("    {:<8} {:>7.2}%", symbol, weight * 100.0);
    }
    super::metrics::print_metrics(&result.metrics);
    Ok(())
}
