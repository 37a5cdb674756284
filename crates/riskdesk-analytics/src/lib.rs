//! Risk analytics over price series.
//!
//! Pure functions only: no I/O, deterministic given identical inputs.
//! Series resolution happens upstream in the cache orchestrator; this
//! crate consumes whatever it is handed.

mod correlation;
mod portfolio;
mod returns;
mod risk;

pub use correlation::{correlation_matrix, pearson};
pub use portfolio::{analyze_portfolio, analyze_symbol, position_pnl, weighted_return_series};
pub use returns::{daily_returns, dated_returns};
pub use risk::{
    annualized_volatility, expected_shortfall, max_drawdown, sharpe_ratio, sortino_ratio,
    value_at_risk, TRADING_DAYS_PER_YEAR,
};
