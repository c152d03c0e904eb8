//! Backtesting engine
//!
//! Replays an allocation engine one bar at a time through the same
//! step -> gating -> planning -> fill path used live.

use crate::backtest::MetricsCalculator;
use crate::data::MarketWindow;
use crate::portfolio::{current_weights, needs_rebalance, plan_orders, PaperBook, PriceMap, TradeRecord};
use crate::strategy::{AllocationEngine, StrategyState};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Equity at the close of one replayed bar
#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: Decimal,
}

/// Backtest result
#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub start_equity: Decimal,
    pub end_equity: Decimal,
    /// Fractional return over the replay
    pub total_return: f64,
    /// Buy-and-hold return of the baseline instrument over the same bars
    pub baseline_return: Option<f64>,
    /// Largest peak-to-trough equity loss, as a fraction
    pub max_drawdown: f64,
    /// Annualized Sharpe ratio of daily returns
    pub sharpe_ratio: f64,
    pub rebalances: usize,
    /// Bars spent warming up
    pub warmup_bars: usize,
    /// Cell id -> bars allocated under that cell
    pub cell_occupancy: BTreeMap<u8, usize>,
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
    pub final_state: StrategyState,
}

/// Backtesting engine
pub struct Backtester<'a, E: AllocationEngine + ?Sized> {
    engine: &'a E,
}

impl<'a, E: AllocationEngine + ?Sized> Backtester<'a, E> {
    pub fn new(engine: &'a E) -> Self {
        Self { engine }
    }

    /// Replay every bar of `anchor` in `window`
    pub fn run(&self, window: &MarketWindow, anchor: &str) -> Result<BacktestResult> {
        let bars = window
            .series(anchor)
            .ok_or_else(|| Error::execution(format!("no bars for backtest anchor {}", anchor)))?;

        let start_equity = self.engine.initial_capital();
        let mut state = StrategyState::new(start_equity);
        let mut trades = Vec::new();
        let mut equity_curve = Vec::with_capacity(bars.len());
        let mut cell_occupancy = BTreeMap::new();
        let mut rebalances = 0;
        let mut warmup_bars = 0;
        let mut baseline_start: Option<Decimal> = None;

        info!(
            engine = self.engine.name(),
            anchor = %anchor,
            bars = bars.len(),
            "starting backtest"
        );

        for (i, bar) in bars.bars().iter().enumerate() {
            let view = window.truncated(anchor, i);
            let prices = latest_prices(&view);

            let result = match self.engine.step(&view, &state) {
                Ok(result) => result,
                Err(e) if e.is_no_op() => {
                    warmup_bars += 1;
                    let book = PaperBook::from_state(&state);
                    let equity = book.equity(&prices)?;
                    book.settle(&mut state, &prices)?;
                    equity_curve.push(EquityPoint {
                        timestamp: bar.timestamp,
                        equity,
                    });
                    continue;
                }
                Err(e) => return Err(e),
            };

            if baseline_start.is_none() {
                baseline_start = self
                    .engine
                    .baseline_symbol()
                    .and_then(|s| prices.get(s).copied());
            }

            state = result.state;
            let mut book = PaperBook::from_state(&state);
            let equity = book.equity(&prices)?;
            let held = current_weights(book.positions(), &prices, equity)?;

            if needs_rebalance(&result.allocation, &held, self.engine.rebalance_threshold()) {
                let orders = plan_orders(&result.allocation, book.positions(), &prices, equity)?;
                let fills = book.execute(&orders, bar.timestamp);
                debug!(bar = i, orders = orders.len(), fills = fills.len(), "rebalanced");
                trades.extend(fills);
                state.last_allocation = result.allocation.weights().clone();
                rebalances += 1;
            }

            book.settle(&mut state, &prices)?;
            state.last_run = Some(bar.timestamp);
            if let Some(cell) = result.cell {
                *cell_occupancy.entry(cell.id()).or_insert(0) += 1;
            }
            equity_curve.push(EquityPoint {
                timestamp: bar.timestamp,
                equity: state.account_equity,
            });
        }

        let end_equity = equity_curve.last().map(|p| p.equity).unwrap_or(start_equity);
        let baseline_return = match (baseline_start, self.engine.baseline_symbol()) {
            (Some(start), Some(symbol)) if start > Decimal::ZERO => window
                .latest(symbol)
                .and_then(|b| ((b.close - start) / start).to_f64()),
            _ => None,
        };
        let curve: Vec<f64> = equity_curve.iter().filter_map(|p| p.equity.to_f64()).collect();

        let result = BacktestResult {
            start_equity,
            end_equity,
            total_return: MetricsCalculator::total_return(&curve),
            baseline_return,
            max_drawdown: MetricsCalculator::max_drawdown(&curve),
            sharpe_ratio: MetricsCalculator::sharpe_ratio(&curve),
            rebalances,
            warmup_bars,
            cell_occupancy,
            trades,
            equity_curve,
            final_state: state,
        };

        info!(
            end_equity = %result.end_equity.round_dp(2),
            total_return = result.total_return,
            rebalances = result.rebalances,
            "backtest finished"
        );
        Ok(result)
    }
}

/// Latest close of every symbol in the window
pub fn latest_prices(window: &MarketWindow) -> PriceMap {
    window
        .symbols()
        .into_iter()
        .filter_map(|s| window.latest(s).map(|b| (s.to_string(), b.close)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticAllocationConfig;
    use crate::data::MarketBar;
    use crate::strategy::StaticAllocationEngine;
    use chrono::{Duration, TimeZone};

    fn series(symbol: &str, closes: &[i64]) -> Vec<MarketBar> {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 21, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let p = Decimal::from(c);
                MarketBar::new(start + Duration::days(i as i64), symbol, p, p, p, p, Decimal::from(1000))
            })
            .collect()
    }

    #[test]
    fn test_static_buy_and_hold() {
        let mut weights = BTreeMap::new();
        weights.insert("QQQ".to_string(), Decimal::ONE);
        let engine = StaticAllocationEngine::new(StaticAllocationConfig {
            weights,
            initial_capital: Decimal::from(1000),
            rebalance_threshold: Decimal::new(5, 2),
        })
        .unwrap();

        let mut window = MarketWindow::new();
        window.insert("QQQ", series("QQQ", &[100, 110, 99, 121]));

        let result = Backtester::new(&engine).run(&window, "QQQ").unwrap();
        assert_eq!(result.rebalances, 1);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.final_state.quantity("QQQ"), Decimal::from(10));
        assert_eq!(result.end_equity, Decimal::from(1210));
        assert!((result.total_return - 0.21).abs() < 1e-9);
        assert!((result.baseline_return.unwrap() - 0.21).abs() < 1e-9);
        assert!((result.max_drawdown - 0.1).abs() < 1e-9);
        assert!(result.cell_occupancy.is_empty());
    }

    #[test]
    fn test_unknown_anchor() {
        let engine = StaticAllocationEngine::new(StaticAllocationConfig {
            weights: BTreeMap::from([("QQQ".to_string(), Decimal::ONE)]),
            initial_capital: Decimal::from(1000),
            rebalance_threshold: Decimal::new(5, 2),
        })
        .unwrap();
        assert!(Backtester::new(&engine).run(&MarketWindow::new(), "QQQ").is_err());
    }
}
