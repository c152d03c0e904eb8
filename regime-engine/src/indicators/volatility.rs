//! Realized volatility and its z-score against a rolling baseline

use crate::indicators::{ta_error, Indicator};
use crate::Result;
use ta::indicators::StandardDeviation;
use ta::Next;

/// Trading days per year used to annualize daily dispersion
pub const TRADING_DAYS: f64 = 252.0;

/// Dispersion below this is treated as "no baseline"
const MIN_DISPERSION: f64 = 1e-12;

/// Annualized standard deviation of daily log returns
#[derive(Debug)]
pub struct RealizedVolatility {
    inner: StandardDeviation,
    period: usize,
    prev_close: Option<f64>,
    update_count: usize,
    last_value: Option<f64>,
}

impl RealizedVolatility {
    /// Create new realized volatility over `period` returns
    pub fn new(period: usize) -> Result<Self> {
        Ok(Self {
            inner: StandardDeviation::new(period).map_err(|e| ta_error("volatility", period, e))?,
            period,
            prev_close: None,
            update_count: 0,
            last_value: None,
        })
    }

    /// Get window length in returns
    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for RealizedVolatility {
    type Input = f64;

    fn name(&self) -> &str {
        "RealizedVolatility"
    }

    fn update(&mut self, close: f64) {
        if close <= 0.0 {
            // unusable print, keep the previous close as the return anchor
            return;
        }
        if let Some(prev) = self.prev_close {
            let sd = self.inner.next((close / prev).ln());
            let sd = if sd.is_finite() { sd } else { 0.0 };
            self.update_count += 1;
            if self.update_count >= self.period {
                self.last_value = Some(sd * TRADING_DAYS.sqrt());
            }
        }
        self.prev_close = Some(close);
    }

    fn value(&self) -> Option<f64> {
        self.last_value
    }

    fn is_ready(&self) -> bool {
        self.update_count >= self.period
    }
}

/// Realized volatility aligned with `closes` (index i uses closes ..=i)
pub fn calculate_realized_volatility(closes: &[f64], period: usize) -> Result<Vec<Option<f64>>> {
    let mut vol = RealizedVolatility::new(period)?;
    let mut results = Vec::with_capacity(closes.len());

    for &close in closes {
        vol.update(close);
        results.push(vol.value());
    }

    Ok(results)
}

/// Z-score of the last value against the whole slice (population dispersion).
///
/// `None` when fewer than two values or the baseline has no dispersion.
pub fn baseline_zscore(values: &[f64]) -> Option<f64> {
    let current = *values.last()?;
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();
    if !std_dev.is_finite() || std_dev < MIN_DISPERSION {
        return None;
    }
    Some((current - mean) / std_dev)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_growth_has_zero_volatility() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 * 1.01f64.powi(i)).collect();
        let vol = calculate_realized_volatility(&closes, 21).unwrap();
        assert_eq!(vol[20], None);
        let v = vol[21].unwrap();
        assert!(v.abs() < 1e-6, "vol {}", v);
    }

    #[test]
    fn test_alternating_moves_are_volatile() {
        let closes: Vec<f64> = (0..30)
            .map(|i| if i % 2 == 0 { 100.0 } else { 102.0 })
            .collect();
        let vol = calculate_realized_volatility(&closes, 10).unwrap();
        assert!(vol.last().unwrap().unwrap() > 0.2);
    }

    #[test]
    fn test_non_positive_close_is_skipped() {
        let mut vol = RealizedVolatility::new(2).unwrap();
        vol.update(100.0);
        vol.update(0.0);
        vol.update(101.0);
        assert!(!vol.is_ready());
        vol.update(102.0);
        assert!(vol.is_ready());
    }

    #[test]
    fn test_baseline_zscore() {
        assert_eq!(baseline_zscore(&[]), None);
        assert_eq!(baseline_zscore(&[1.0]), None);
        assert_eq!(baseline_zscore(&[2.0, 2.0, 2.0]), None);

        let z = baseline_zscore(&[1.0, 1.0, 1.0, 4.0]).unwrap();
        assert!(z > 1.5);
        let z = baseline_zscore(&[4.0, 4.0, 4.0, 1.0]).unwrap();
        assert!(z < -1.5);
    }
}
