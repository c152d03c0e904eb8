//! Stored vs. broker-observed position reconciliation

use regime_engine::{Error, Result};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// One instrument whose stored and observed quantities differ
#[derive(Debug, Clone, PartialEq)]
pub struct Discrepancy {
    pub symbol: String,
    pub stored: Decimal,
    pub observed: Decimal,
    /// |stored - observed| relative to the larger magnitude, in percent
    pub drift_pct: Decimal,
}

pub fn drift_pct(stored: Decimal, observed: Decimal) -> Decimal {
    let scale = stored.abs().max(observed.abs());
    if scale.is_zero() {
        return Decimal::ZERO;
    }
    (stored - observed).abs() / scale * Decimal::ONE_HUNDRED
}

/// Compare stored and observed quantities.
///
/// Any instrument drifting beyond `max_drift_pct` is an
/// [`Error::Reconciliation`]; smaller discrepancies are returned for logging.
pub fn reconcile(
    strategy_id: &str,
    stored: &BTreeMap<String, Decimal>,
    observed: &BTreeMap<String, Decimal>,
    max_drift_pct: Decimal,
) -> Result<Vec<Discrepancy>> {
    let symbols: BTreeSet<&String> = stored.keys().chain(observed.keys()).collect();
    let mut discrepancies = Vec::new();

    for symbol in symbols {
        let s = stored.get(symbol).copied().unwrap_or(Decimal::ZERO);
        let o = observed.get(symbol).copied().unwrap_or(Decimal::ZERO);
        if s == o {
            continue;
        }
        let drift = drift_pct(s, o);
        if drift > max_drift_pct {
            return Err(Error::Reconciliation {
                symbol: symbol.clone(),
                stored: s,
                observed: o,
                drift_pct: drift.round_dp(2),
                max_drift_pct,
            });
        }
        warn!(
            strategy_id = %strategy_id,
            symbol = %symbol,
            stored = %s,
            observed = %o,
            drift_pct = %drift.round_dp(2),
            "position discrepancy within tolerance"
        );
        discrepancies.push(Discrepancy {
            symbol: symbol.clone(),
            stored: s,
            observed: o,
            drift_pct: drift,
        });
    }

    Ok(discrepancies)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, i64)]) -> BTreeMap<String, Decimal> {
        entries.iter().map(|(s, q)| (s.to_string(), Decimal::from(*q))).collect()
    }

    #[test]
    fn test_matching_books() {
        let book = map(&[("QQQ", 10), ("TQQQ", 40)]);
        assert!(reconcile("main", &book, &book, Decimal::from(5)).unwrap().is_empty());
    }

    #[test]
    fn test_small_drift_is_reported() {
        let stored = map(&[("TQQQ", 100)]);
        let observed = map(&[("TQQQ", 98)]);
        let found = reconcile("main", &stored, &observed, Decimal::from(5)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].drift_pct, Decimal::from(2));
    }

    #[test]
    fn test_large_drift_is_an_error() {
        let stored = map(&[("QQQ", 10)]);
        let observed = map(&[("QQQ", 10), ("TMF", 50)]);
        match reconcile("main", &stored, &observed, Decimal::from(5)) {
            Err(Error::Reconciliation { symbol, drift_pct, .. }) => {
                assert_eq!(symbol, "TMF");
                assert_eq!(drift_pct, Decimal::ONE_HUNDRED);
            }
            other => panic!("expected reconciliation error, got {:?}", other),
        }
    }
}
