//! Volatility, risk-adjusted ratios, drawdown, and tail risk.

use statrs::statistics::Statistics;

/// Annualization factor for daily bars.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Sample standard deviation of daily returns, annualized by sqrt(252).
///
/// Needs at least two returns; `None` otherwise.
pub fn annualized_volatility(returns: &[f64]) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    Some(returns.std_dev() * TRADING_DAYS_PER_YEAR.sqrt())
}

/// Sharpe ratio: `(mean(returns) * 252 - risk_free_rate) / volatility`.
///
/// Undefined for a zero-variance series; the `None` sentinel is the
/// contract, never a division by zero or an infinity.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> Option<f64> {
    let volatility = annualized_volatility(returns)?;
    if volatility == 0.0 {
        return None;
    }
    let annual_return = returns.mean() * TRADING_DAYS_PER_YEAR;
    Some((annual_return - risk_free_rate) / volatility)
}

/// Sortino ratio: like Sharpe but penalizing only downside deviation.
///
/// `None` when there are no negative returns or the downside deviation
/// is zero.
pub fn sortino_ratio(returns: &[f64], risk_free_rate: f64) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    if downside.is_empty() {
        return None;
    }
    let downside_variance = downside.iter().map(|r| r * r).sum::<f64>() / downside.len() as f64;
    let downside_dev = downside_variance.sqrt() * TRADING_DAYS_PER_YEAR.sqrt();
    if downside_dev == 0.0 {
        return None;
    }
    let annual_return = returns.mean() * TRADING_DAYS_PER_YEAR;
    Some((annual_return - risk_free_rate) / downside_dev)
}

/// Maximum drawdown of a close series: the worst peak-to-trough decline
/// as a negative fraction. `None` for an empty series.
pub fn max_drawdown(closes: &[f64]) -> Option<f64> {
    let first = *closes.first()?;
    let mut peak = first;
    let mut worst = 0.0f64;
    for &close in closes {
        if close > peak {
            peak = close;
        }
        if peak > 0.0 {
            worst = worst.min((close - peak) / peak);
        }
    }
    Some(worst)
}

/// Historical one-day value at risk at the given confidence level.
///
/// Empirical quantile of the return distribution: the loss not exceeded
/// with probability `confidence`. Positive number for a loss.
pub fn value_at_risk(returns: &[f64], confidence: f64) -> Option<f64> {
    if returns.is_empty() || !(0.0..1.0).contains(&confidence) {
        return None;
    }
    let mut sorted = returns.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let idx = (((1.0 - confidence) * sorted.len() as f64).floor() as usize)
        .min(sorted.len() - 1);
    Some(-sorted[idx])
}

/// Expected shortfall: mean loss in the tail beyond the VaR threshold.
pub fn expected_shortfall(returns: &[f64], confidence: f64) -> Option<f64> {
    let var = value_at_risk(returns, confidence)?;
    let tail: Vec<f64> = returns.iter().copied().filter(|r| *r <= -var).collect();
    if tail.is_empty() {
        return None;
    }
    Some(-(tail.iter().sum::<f64>() / tail.len() as f64))
}
