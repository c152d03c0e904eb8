//! Fixed-weight allocation engine, used as a benchmark strategy

use crate::config::StaticAllocationConfig;
use crate::data::MarketWindow;
use crate::strategy::{Allocation, AllocationEngine, AllocationResult, StrategyState};
use crate::{Error, Result};
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct StaticAllocationEngine {
    config: StaticAllocationConfig,
    allocation: Allocation,
}

impl StaticAllocationEngine {
    pub fn new(config: StaticAllocationConfig) -> Result<Self> {
        config.validate()?;
        let allocation = Allocation::new(config.weights.clone())?;
        Ok(Self { config, allocation })
    }
}

impl AllocationEngine for StaticAllocationEngine {
    fn name(&self) -> &str {
        "StaticAllocation"
    }

    fn required_symbols(&self) -> Vec<String> {
        self.config.weights.keys().cloned().collect()
    }

    fn lookback(&self) -> usize {
        1
    }

    fn initial_capital(&self) -> Decimal {
        self.config.initial_capital
    }

    fn rebalance_threshold(&self) -> Decimal {
        self.config.rebalance_threshold
    }

    fn baseline_symbol(&self) -> Option<&str> {
        self.config.weights.keys().next().map(String::as_str)
    }

    fn step(&self, window: &MarketWindow, prior: &StrategyState) -> Result<AllocationResult> {
        if let Some(symbol) = self.allocation.symbols().find(|s| window.latest(s).is_none()) {
            return Err(Error::InsufficientData {
                symbol: symbol.to_string(),
                required: 1,
                available: 0,
            });
        }
        Ok(AllocationResult {
            allocation: self.allocation.clone(),
            cell: None,
            state: prior.clone(),
            signals: None,
        })
    }
}
