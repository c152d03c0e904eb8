//! Backtest report generation

use crate::backtest::BacktestResult;

/// Backtest report
#[derive(Debug)]
pub struct BacktestReport {
    result: BacktestResult,
}

impl BacktestReport {
    /// Create new report from result
    pub fn new(result: BacktestResult) -> Self {
        Self { result }
    }

    /// Format report as string
    pub fn format(&self) -> String {
        let r = &self.result;
        let baseline = r
            .baseline_return
            .map(|b| format!("{:.2}%", b * 100.0))
            .unwrap_or_else(|| "n/a".to_string());
        let evaluated: usize = r.cell_occupancy.values().sum();
        let occupancy = if r.cell_occupancy.is_empty() {
            "  (no regime cells)\n".to_string()
        } else {
            r.cell_occupancy
                .iter()
                .map(|(cell, bars)| {
                    format!(
                        "  Cell {}: {} bars ({:.1}%)\n",
                        cell,
                        bars,
                        *bars as f64 / evaluated.max(1) as f64 * 100.0
                    )
                })
                .collect()
        };

        format!(
            r#"
Backtest Results
================
Starting Equity: ${:.2}
Ending Equity: ${:.2}
Total Return: {:.2}%
Baseline Return: {}
Maximum Drawdown: {:.2}%
Sharpe Ratio: {:.2}
Rebalances: {}
Trades: {}
Warm-up Bars: {}
Cell Occupancy:
{}"#,
            r.start_equity,
            r.end_equity,
            r.total_return * 100.0,
            baseline,
            r.max_drawdown * 100.0,
            r.sharpe_ratio,
            r.rebalances,
            r.trades.len(),
            r.warmup_bars,
            occupancy,
        )
    }

    /// Get result reference
    pub fn result(&self) -> &BacktestResult {
        &self.result
    }
}
