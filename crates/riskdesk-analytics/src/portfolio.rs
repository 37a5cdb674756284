//! Portfolio-level aggregation and P&L.

use std::collections::HashMap;

use chrono::NaiveDate;
use riskdesk_core::{
    AnalyticsError, PositionPnl, PriceSeries, RiskMetrics,
};
use rust_decimal::Decimal;

use crate::correlation::correlation_matrix;
use crate::returns::{daily_returns, dated_returns};
use crate::risk::{
    annualized_volatility, expected_shortfall, max_drawdown, sharpe_ratio, sortino_ratio,
    value_at_risk, TRADING_DAYS_PER_YEAR,
};

/// Minimum bar count for any metric computation: two returns.
const MIN_BARS: usize = 3;

/// Combine per-symbol daily returns into one weighted series.
///
/// Symbols are inner-joined on return date; a date missing from any
/// constituent is dropped for all. Each surviving date's portfolio return
/// is `sum(weight_i * return_i)`. This weighted series then feeds the
/// ordinary return/volatility formulas — deliberately not an average of
/// per-asset volatilities, which ignores co-movement.
pub fn weighted_return_series(
    series: &[PriceSeries],
    weights: &[(String, f64)],
) -> Result<Vec<(NaiveDate, f64)>, AnalyticsError> {
    if series.len() != weights.len() {
        return Err(AnalyticsError::InvalidAllocation(format!(
            "{} series for {} weights",
            series.len(),
            weights.len()
        )));
    }
    for (s, (symbol, _)) in series.iter().zip(weights) {
        if &s.symbol != symbol {
            return Err(AnalyticsError::InvalidAllocation(format!(
                "series order mismatch: expected {}, got {}",
                symbol, s.symbol
            )));
        }
    }

    let per_symbol: Vec<HashMap<NaiveDate, f64>> = series
        .iter()
        .map(|s| dated_returns(s).into_iter().collect())
        .collect();

    // Iterate the first symbol's dates; inner join against the rest.
    let first = match per_symbol.first() {
        Some(first) => first,
        None => return Ok(Vec::new()),
    };

    let mut combined: Vec<(NaiveDate, f64)> = first
        .keys()
        .copied()
        .filter(|date| per_symbol[1..].iter().all(|m| m.contains_key(date)))
        .map(|date| {
            let total = per_symbol
                .iter()
                .zip(weights)
                .map(|(m, (_, w))| w * m[&date])
                .sum();
            (date, total)
        })
        .collect();
    combined.sort_by_key(|(date, _)| *date);
    Ok(combined)
}

/// Full metric set for a single symbol's series.
pub fn analyze_symbol(
    series: &PriceSeries,
    risk_free_rate: f64,
) -> Result<RiskMetrics, AnalyticsError> {
    if series.len() < MIN_BARS {
        return Err(AnalyticsError::InsufficientData {
            required: MIN_BARS,
            available: series.len(),
        });
    }
    let closes = series.closes();
    let returns = daily_returns(&closes);
    metrics_from_returns(&returns, &closes, risk_free_rate, None)
}

/// Full metric set for a weighted portfolio, including the correlation
/// matrix of its constituents.
pub fn analyze_portfolio(
    series: &[PriceSeries],
    weights: &[(String, f64)],
    risk_free_rate: f64,
    min_correlation_overlap: usize,
) -> Result<RiskMetrics, AnalyticsError> {
    let combined = weighted_return_series(series, weights)?;
    let returns: Vec<f64> = combined.iter().map(|(_, r)| *r).collect();
    if returns.len() < MIN_BARS - 1 {
        return Err(AnalyticsError::InsufficientData {
            required: MIN_BARS,
            available: returns.len() + 1,
        });
    }

    // Synthetic growth-of-a-dollar curve for drawdown over the portfolio.
    let mut equity = Vec::with_capacity(returns.len() + 1);
    let mut value = 1.0;
    equity.push(value);
    for r in &returns {
        value *= 1.0 + r;
        equity.push(value);
    }

    let correlation = if series.len() > 1 {
        Some(correlation_matrix(series, min_correlation_overlap))
    } else {
        None
    };
    metrics_from_returns(&returns, &equity, risk_free_rate, correlation)
}

/// Position P&L at the resolved quote: `price * quantity - cost_basis`.
pub fn position_pnl(
    symbol: &str,
    current_price: Decimal,
    quantity: Decimal,
    cost_basis: Decimal,
    stale: bool,
) -> PositionPnl {
    PositionPnl {
        symbol: symbol.to_string(),
        current_price,
        quantity,
        cost_basis,
        pnl: current_price * quantity - cost_basis,
        stale,
    }
}

fn metrics_from_returns(
    returns: &[f64],
    closes: &[f64],
    risk_free_rate: f64,
    correlation: Option<riskdesk_core::CorrelationMatrix>,
) -> Result<RiskMetrics, AnalyticsError> {
    let volatility = annualized_volatility(returns).ok_or(AnalyticsError::InsufficientData {
        required: MIN_BARS,
        available: returns.len() + 1,
    })?;
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;

    Ok(RiskMetrics {
        mean_return_annualized: mean * TRADING_DAYS_PER_YEAR,
        volatility,
        sharpe_ratio: sharpe_ratio(returns, risk_free_rate),
        sortino_ratio: sortino_ratio(returns, risk_free_rate),
        max_drawdown: max_drawdown(closes),
        var_95: value_at_risk(returns, 0.95),
        es_95: expected_shortfall(returns, 0.95),
        correlation,
    })
}
