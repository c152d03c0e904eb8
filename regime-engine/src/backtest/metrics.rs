//! Backtest performance metrics

use crate::indicators::TRADING_DAYS;

/// Metrics over an equity curve sampled once per bar
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Fractional change from the first to the last point
    pub fn total_return(curve: &[f64]) -> f64 {
        match (curve.first(), curve.last()) {
            (Some(&first), Some(&last)) if first > 0.0 => (last - first) / first,
            _ => 0.0,
        }
    }

    /// Largest peak-to-trough loss as a fraction of the peak
    pub fn max_drawdown(curve: &[f64]) -> f64 {
        let mut peak = f64::MIN;
        let mut max_drawdown = 0.0;
        for &equity in curve {
            if equity > peak {
                peak = equity;
            }
            if peak > 0.0 {
                let drawdown = (peak - equity) / peak;
                if drawdown > max_drawdown {
                    max_drawdown = drawdown;
                }
            }
        }
        max_drawdown
    }

    /// Bar-to-bar fractional returns
    pub fn daily_returns(curve: &[f64]) -> Vec<f64> {
        curve
            .windows(2)
            .filter(|w| w[0] > 0.0)
            .map(|w| w[1] / w[0] - 1.0)
            .collect()
    }

    /// Annualized Sharpe ratio (zero risk-free rate)
    pub fn sharpe_ratio(curve: &[f64]) -> f64 {
        let returns = Self::daily_returns(curve);
        if returns.len() < 2 {
            return 0.0;
        }
        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (returns.len() - 1) as f64;
        let std_dev = variance.sqrt();
        if std_dev > 0.0 {
            mean / std_dev * TRADING_DAYS.sqrt()
        } else {
            0.0
        }
    }
}
