//! Base engine trait and the per-step result

use crate::data::MarketWindow;
use crate::strategy::{Allocation, Cell, RegimeSignals, StrategyState};
use crate::Result;
use rust_decimal::Decimal;

/// Base trait for all allocation engines.
///
/// `step` is a pure function of the window and the prior state: it never
/// mutates the engine and returns the next state instead of storing it.
pub trait AllocationEngine {
    /// Get engine name
    fn name(&self) -> &str;

    /// Symbols the engine needs bars or quotes for
    fn required_symbols(&self) -> Vec<String>;

    /// Trailing bars to fetch per symbol
    fn lookback(&self) -> usize;

    /// Starting cash of a fresh book
    fn initial_capital(&self) -> Decimal;

    /// Summed absolute weight deviation that triggers a rebalance
    fn rebalance_threshold(&self) -> Decimal;

    /// Buy-and-hold comparison instrument
    fn baseline_symbol(&self) -> Option<&str> {
        None
    }

    /// Compute the target allocation for the latest bar of `window`
    fn step(&self, window: &MarketWindow, prior: &StrategyState) -> Result<AllocationResult>;
}

/// Output of one engine step
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationResult {
    /// Target weights; the remainder is cash
    pub allocation: Allocation,
    /// Regime cell, for engines that classify regimes
    pub cell: Option<Cell>,
    /// Prior state with the regime fields updated. Positions, cash and
    /// `last_allocation` are left for the executor to settle.
    pub state: StrategyState,
    pub signals: Option<RegimeSignals>,
}
