//! Symbol metrics command.

use std::path::Path;

use anyhow::Result;
use riskdesk_core::RiskMetrics;

use crate::cli::MetricsArgs;

pub async fn run(args: MetricsArgs, config_path: &Path) -> Result<()> {
    let config = super::load(config_path)?;
    let engine = super::build_engine(&config)?;
    let range = super::parse_range(&args.start, &args.end)?;

    let result = engine
        .get_symbol_metrics(&args.symbol, range, args.risk_free_rate)
        .await?;

    if args.output == "json" {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("Risk metrics for {} ({})", args.symbol, range);
    print_metrics(&result.metrics);
    Ok(())
}

fn pct(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

fn ratio(value: Option<f64>) -> String {
    // "n/a" is the undefined sentinel rendered, never an infinity.
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.4}", v))
}

pub(super) fn print_metrics(metrics: &RiskMetrics) {
    println!("  annualized return   {:>12}", pct(metrics.mean_return_annualized));
    println!("  annualized vol      {:>12}", pct(metrics.volatility));
    println!("  sharpe ratio        {:>12}", ratio(metrics.sharpe_ratio));
    println!("  sortino ratio       {:>12}", ratio(metrics.sortino_ratio));
    println!(
        "  max drawdown        {:>12}",
        metrics
            .max_drawdown
            .map_or_else(|| "n/a".to_string(), pct)
    );
    println!(
        "  VaR (95%)           {:>12}",
        metrics.var_95.map_or_else(|| "n/a".to_string(), pct)
    );
    println!(
        "  ES (95%)            {:>12}",
        metrics.es_95.map_or_else(|| "n/a".to_string(), pct)
    );

    if let Some(matrix) = &metrics.correlation {
        println!("  correlation matrix:");
        print!("  {:<8}", "");
        for symbol in &matrix.symbols {
            print!("{:>8}", symbol);
        }
        println!();
        for (i, symbol) in matrix.symbols.iter().enumerate() {
            print!("  {:<8}", symbol);
            for value in &matrix.values[i] {
                match value {
                    Some(v) => print!("{:>8.3}", v),
                    None => print!("{:>8}", "n/a"),
                }
            }
            println!();
        }
    }
}
