//! Deterministic request fingerprints.

use riskdesk_core::DateRange;

/// Fingerprint of an analysis request: symbol set with weights, date
/// range, and risk-free rate.
///
/// Constituents are sorted by symbol so the key is order-independent —
/// {AAPL, GOOGL} and {GOOGL, AAPL} collapse to one cache row. Weights
/// and the rate are fixed-precision formatted so float noise below
/// meaningful tolerance cannot split equivalent requests.
pub fn analysis_key(
    constituents: &[(String, f64)],
    range: &DateRange,
    risk_free_rate: f64,
) -> String {
    let mut parts: Vec<String> = constituents
        .iter()
        .map(|(symbol, weight)| format!("{}={:.8}", symbol, weight))
        .collect();
    parts.sort();

    let canonical = format!(
        "v1|{}|{}|{}|{:.6}",
        parts.join(","),
        range.start,
        range.end,
        risk_free_rate
    );
    format!("{:x}", md5::compute(canonical))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        )
        .unwrap()
    }

    fn c(symbol: &str, weight: f64) -> (String, f64) {
        (symbol.to_string(), weight)
    }

    #[test]
    fn test_key_is_stable_across_symbol_order() {
        let a = analysis_key(&[c("AAPL", 0.5), c("GOOGL", 0.5)], &range(), 0.02);
        let b = analysis_key(&[c("GOOGL", 0.5), c("AAPL", 0.5)], &range(), 0.02);
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_varies_with_parameters() {
        let base = analysis_key(&[c("AAPL", 1.0)], &range(), 0.02);
        assert_ne!(base, analysis_key(&[c("AAPL", 1.0)], &range(), 0.03));
        assert_ne!(base, analysis_key(&[c("AAPL", 0.5)], &range(), 0.02));
        assert_ne!(base, analysis_key(&[c("MSFT", 1.0)], &range(), 0.02));

        let other_range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
        )
        .unwrap();
        assert_ne!(base, analysis_key(&[c("AAPL", 1.0)], &other_range, 0.02));
    }

    #[test]
    fn test_identical_requests_collapse() {
        let a = analysis_key(&[c("AAPL", 0.5), c("BND", 0.5)], &range(), 0.02);
        let b = analysis_key(&[c("AAPL", 0.5), c("BND", 0.5)], &range(), 0.02);
        assert_eq!(a, b);
    }
}
