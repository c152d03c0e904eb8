//! Per-strategy persisted state
//!
//! One `StrategyState` exists per registered strategy. The engine never
//! mutates it in place: `step` receives the prior value and returns the next.

use crate::strategy::Cell;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Volatility regime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolState {
    #[default]
    Low,
    High,
}

/// Trend regime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendState {
    BullStrong,
    #[default]
    Sideways,
    BearStrong,
}

impl fmt::Display for VolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolState::Low => write!(f, "Low"),
            VolState::High => write!(f, "High"),
        }
    }
}

impl fmt::Display for TrendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendState::BullStrong => write!(f, "BullStrong"),
            TrendState::Sideways => write!(f, "Sideways"),
            TrendState::BearStrong => write!(f, "BearStrong"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyState {
    /// Symbol -> signed share quantity
    pub current_positions: BTreeMap<String, Decimal>,
    /// Symbol -> weight of the last executed target allocation
    pub last_allocation: BTreeMap<String, Decimal>,
    pub account_equity: Decimal,
    pub cash: Decimal,
    pub vol_state: VolState,
    pub trend_state: TrendState,
    /// False until the first post-warm-up evaluation seeded the regime
    pub regime_initialized: bool,
    pub cell1_exit_pending_days: u32,
    pub last_run: Option<DateTime<Utc>>,
    /// Baseline instrument price on the first completed run
    pub baseline_entry_price: Option<Decimal>,
}

impl StrategyState {
    /// Fresh book holding only cash
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            account_equity: initial_capital,
            cash: initial_capital,
            ..Self::default()
        }
    }

    /// Cell the strategy is currently allocated under, once the regime is seeded
    pub fn cell(&self) -> Option<Cell> {
        self.regime_initialized
            .then(|| Cell::from_regime(self.trend_state, self.vol_state))
    }

    pub fn in_cell1(&self) -> bool {
        self.cell() == Some(Cell::BullLowVol)
    }

    /// Share count held for a symbol (zero when flat)
    pub fn quantity(&self, symbol: &str) -> Decimal {
        self.current_positions.get(symbol).copied().unwrap_or(Decimal::ZERO)
    }
}
