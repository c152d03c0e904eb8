//! Regime-Engine: daily market regime classification and target allocation
//!
//! This crate turns a trailing window of daily bars into a target portfolio
//! allocation across a fixed instrument universe:
//! - [ta-rs](https://github.com/greyblake/ta-rs) for moving averages and dispersion
//! - [rust_decimal](https://docs.rs/rust_decimal) for prices, quantities and weights
//!
//! # Features
//!
//! - **Data**: immutable `MarketBar` windows keyed by symbol
//! - **Indicators**: SMA, realized volatility, adaptive trend filter
//! - **Strategy Engine**: hysteresis volatility state, structural + adaptive
//!   trend fusion, Cell 1 exit confirmation, treasury overlay, leverage scaling
//! - **Portfolio**: rebalance gating, two-phase order planning, paper book
//! - **Backtesting**: day-by-day replay through the live decision path
//!
//! # Example
//!
//! ```no_run
//! use regime_engine::prelude::*;
//!
//! fn run(window: &MarketWindow) -> regime_engine::Result<()> {
//!     let engine = RegimeAllocationEngine::new(RegimeConfig::default())?;
//!     let outcome = engine.step(window, &StrategyState::new(engine.initial_capital()))?;
//!     println!("cell {:?}: {}", outcome.cell, outcome.allocation);
//!     Ok(())
//! }
//! ```

pub mod backtest;
pub mod config;
pub mod data;
pub mod error;
pub mod indicators;
pub mod portfolio;
pub mod strategy;

pub use error::Error;

// Re-export commonly used types
pub mod prelude {
    pub use crate::backtest::*;
    pub use crate::config::{load_json, RegimeConfig, StaticAllocationConfig};
    pub use crate::data::*;
    pub use crate::error::Error;
    pub use crate::indicators::*;
    pub use crate::portfolio::*;
    pub use crate::strategy::{
        build_allocation, classify_trend, confirm_cell1_exit, decide, next_vol_state, Allocation,
        AllocationEngine, AllocationResult, BondTrend, Cell, CellTemplate, ConfirmationEvent, Implementation,
        RegimeAllocationEngine, RegimeDecision, RegimeSignals, StaticAllocationEngine, StrategyEngine,
        StrategyState, TrendState, VolState, WEIGHT_DP,
    };
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
