//! Risk analysis result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pairwise Pearson correlation matrix over a symbol set.
///
/// Symmetric with a unit diagonal by construction. A cell is `None` when
/// the two return series overlap on fewer dates than the configured
/// minimum sample threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub symbols: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    /// Look up the correlation between two symbols.
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.symbols.iter().position(|s| s == a)?;
        let j = self.symbols.iter().position(|s| s == b)?;
        self.values[i][j]
    }
}

/// Computed risk metrics for one symbol or a weighted portfolio.
///
/// Ratios are `None` when mathematically undefined (zero volatility, no
/// downside observations) rather than infinities or silent zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// Mean daily return scaled by 252 trading days.
    pub mean_return_annualized: f64,
    /// Sample standard deviation of daily returns, annualized by sqrt(252).
    pub volatility: f64,
    pub sharpe_ratio: Option<f64>,
    pub sortino_ratio: Option<f64>,
    /// Worst peak-to-trough decline of the close series, as a negative
    /// fraction.
    pub max_drawdown: Option<f64>,
    /// Historical one-day value at risk at 95% confidence.
    pub var_95: Option<f64>,
    /// Expected shortfall beyond the 95% VaR.
    pub es_95: Option<f64>,
    /// Present for multi-symbol requests only.
    pub correlation: Option<CorrelationMatrix>,
}

/// A cached analysis computation.
///
/// `key` is the deterministic fingerprint of the request; `computed_at`
/// anchors the ANALYSIS freshness window and the backing-series
/// supersession check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub key: String,
    pub computed_at: DateTime<Utc>,
    pub metrics: RiskMetrics,
}
