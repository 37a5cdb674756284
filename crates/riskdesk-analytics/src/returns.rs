//! Daily return computation.

use chrono::NaiveDate;
use riskdesk_core::PriceSeries;

/// Simple daily returns: `(close[t] - close[t-1]) / close[t-1]`.
///
/// A series of n closes yields at most n-1 returns. A return is excluded
/// (not zeroed) when the previous close is 0, so a bad upstream tick
/// cannot poison the statistics with an infinity.
pub fn daily_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

/// Daily returns labeled with the date of the later close, for
/// cross-symbol alignment. Same exclusion rule as [`daily_returns`].
pub fn dated_returns(series: &PriceSeries) -> Vec<(NaiveDate, f64)> {
    series
        .bars()
        .windows(2)
        .filter(|w| w[0].close != 0.0)
        .map(|w| (w[1].date, (w[1].close - w[0].close) / w[0].close))
        .collect()
}
