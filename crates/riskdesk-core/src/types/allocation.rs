//! Portfolio allocation and position P&L types.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Tolerance for the weight-sum invariant.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// One allocation line: dollars committed to a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationLine {
    pub symbol: String,
    pub dollars: Decimal,
}

/// An ordered set of (symbol, dollar_amount) pairs.
///
/// The engine derives weights from the dollar amounts; callers never pass
/// weights directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioAllocation {
    lines: Vec<AllocationLine>,
}

impl PortfolioAllocation {
    /// Build an allocation, validating symbols and uniqueness.
    pub fn new(lines: Vec<AllocationLine>) -> Result<Self, EngineError> {
        if lines.is_empty() {
            return Err(EngineError::Validation("allocation is empty".to_string()));
        }
        for line in &lines {
            if line.symbol.trim().is_empty() {
                return Err(EngineError::Validation(
                    "allocation contains an empty symbol".to_string(),
                ));
            }
            if line.dollars < Decimal::ZERO {
                return Err(EngineError::Validation(format!(
                    "negative allocation for {}",
                    line.symbol
                )));
            }
        }
        let mut seen = std::collections::HashSet::new();
        for line in &lines {
            if !seen.insert(line.symbol.as_str()) {
                return Err(EngineError::Validation(format!(
                    "duplicate symbol in allocation: {}",
                    line.symbol
                )));
            }
        }
        Ok(Self { lines })
    }

    pub fn lines(&self) -> &[AllocationLine] {
        &self.lines
    }

    pub fn symbols(&self) -> Vec<String> {
        self.lines.iter().map(|l| l.symbol.clone()).collect()
    }

    /// Derive per-symbol weights: `dollars_i / total`.
    ///
    /// Fails with a validation error when the total is zero so downstream
    /// math never divides by zero. The returned weights sum to 1.0 within
    /// [`WEIGHT_SUM_TOLERANCE`].
    pub fn weights(&self) -> Result<Vec<(String, f64)>, EngineError> {
        let total: Decimal = self.lines.iter().map(|l| l.dollars).sum();
        if total <= Decimal::ZERO {
            return Err(EngineError::Validation(
                "allocation dollars sum to zero".to_string(),
            ));
        }
        let weights = self
            .lines
            .iter()
            .map(|l| {
                let w = (l.dollars / total).to_f64().ok_or_else(|| {
                    EngineError::Validation(format!("allocation for {} is not representable", l.symbol))
                })?;
                Ok((l.symbol.clone(), w))
            })
            .collect::<Result<Vec<_>, EngineError>>()?;

        let sum: f64 = weights.iter().map(|(_, w)| w).sum();
        debug_assert!((sum - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
        Ok(weights)
    }
}

/// An open position supplied by the caller for P&L valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionInput {
    pub symbol: String,
    pub quantity: Decimal,
    pub cost_basis: Decimal,
}

/// P&L of one position at the resolved quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionPnl {
    pub symbol: String,
    pub current_price: Decimal,
    pub quantity: Decimal,
    pub cost_basis: Decimal,
    /// `current_price * quantity - cost_basis`
    pub pnl: Decimal,
    /// True when the quote used for valuation was stale.
    pub stale: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(symbol: &str, dollars: Decimal) -> AllocationLine {
        AllocationLine {
            symbol: symbol.to_string(),
            dollars,
        }
    }

    #[test]
    fn test_weights_from_dollars() {
        let allocation = PortfolioAllocation::new(vec![
            line("AAPL", dec!(50000)),
            line("GOOGL", dec!(30000)),
            line("BND", dec!(20000)),
        ])
        .unwrap();

        let weights = allocation.weights().unwrap();
        assert_eq!(weights[0], ("AAPL".to_string(), 0.5));
        assert_eq!(weights[1], ("GOOGL".to_string(), 0.3));
        assert_eq!(weights[2], ("BND".to_string(), 0.2));

        let sum: f64 = weights.iter().map(|(_, w)| w).sum();
        assert!((sum - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
    }

    #[test]
    fn test_zero_dollars_is_a_validation_error() {
        let allocation =
            PortfolioAllocation::new(vec![line("AAPL", dec!(0)), line("GOOGL", dec!(0))]).unwrap();
        assert!(matches!(
            allocation.weights(),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn test_duplicate_symbol_rejected() {
        let result =
            PortfolioAllocation::new(vec![line("AAPL", dec!(100)), line("AAPL", dec!(200))]);
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }

    #[test]
    fn test_empty_allocation_rejected() {
        assert!(matches!(
            PortfolioAllocation::new(vec![]),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn test_negative_dollars_rejected() {
        let result = PortfolioAllocation::new(vec![line("AAPL", dec!(-5))]);
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }
}
