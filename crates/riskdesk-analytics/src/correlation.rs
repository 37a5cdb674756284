//! Pairwise correlation over aligned return series.

use std::collections::HashMap;

use chrono::NaiveDate;
use riskdesk_core::{CorrelationMatrix, PriceSeries};

use crate::returns::dated_returns;

/// Pearson correlation coefficient of two equal-length samples.
///
/// `None` when either sample has zero variance or fewer than two points.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len();
    if n != y.len() || n < 2 {
        return None;
    }
    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

/// Pairwise Pearson correlation matrix of daily returns.
///
/// Each pair is aligned by inner join on return date: dates missing from
/// either series are dropped for that pair. Pairs overlapping on fewer
/// than `min_overlap` dates yield `None` — a handful of shared days says
/// nothing about co-movement. Symmetric with unit diagonal by
/// construction.
pub fn correlation_matrix(series: &[PriceSeries], min_overlap: usize) -> CorrelationMatrix {
    let symbols: Vec<String> = series.iter().map(|s| s.symbol.clone()).collect();
    let returns: Vec<Vec<(NaiveDate, f64)>> = series.iter().map(dated_returns).collect();
    let indexed: Vec<HashMap<NaiveDate, f64>> = returns
        .iter()
        .map(|r| r.iter().copied().collect())
        .collect();

    let n = series.len();
    let mut values = vec![vec![None; n]; n];
    for (i, row) in values.iter_mut().enumerate() {
        row[i] = Some(1.0);
    }

    for i in 0..n {
        for j in (i + 1)..n {
            let mut xs = Vec::new();
            let mut ys = Vec::new();
            for (date, x) in &returns[i] {
                if let Some(y) = indexed[j].get(date) {
                    xs.push(*x);
                    ys.push(*y);
                }
            }
            let cell = if xs.len() < min_overlap {
                None
            } else {
                pearson(&xs, &ys)
            };
            values[i][j] = cell;
            values[j][i] = cell;
        }
    }

    CorrelationMatrix { symbols, values }
}
