use chrono::{DateTime, Utc};
use regime_engine::strategy::{TrendState, VolState};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-strategy performance record written after every completed cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub run_id: Uuid,
    pub strategy_id: String,
    pub timestamp: DateTime<Utc>,
    pub equity: Decimal,
    pub cash: Decimal,
    pub positions_value: Decimal,
    pub cell_id: Option<u8>,
    pub trend_state: Option<TrendState>,
    pub vol_state: Option<VolState>,
    /// Buy-and-hold comparison instrument
    pub baseline_symbol: Option<String>,
    pub baseline_price: Option<Decimal>,
    /// Initial capital held in the baseline since the first run
    pub baseline_value: Option<Decimal>,
}

/// Value of `capital` invested in the baseline at `entry` and marked at `price`
pub fn baseline_value(capital: Decimal, entry: Decimal, price: Decimal) -> Option<Decimal> {
    if entry <= Decimal::ZERO {
        return None;
    }
    Some(capital * price / entry)
}
