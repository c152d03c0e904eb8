//! External collaborators of the runner
//!
//! Market data, quotes, the broker ledger, order routing and the run journal
//! are reached only through these traits so the runner can be driven by
//! file-backed adapters in the binary and by in-memory mocks in tests.

pub mod file;
pub mod paper;

pub use file::{FileMarketData, JsonlJournal, LastCloseQuotes};
pub use paper::PaperBroker;

use crate::models::PerformanceSnapshot;
use anyhow::Result;
use async_trait::async_trait;
use regime_engine::data::MarketBar;
use regime_engine::portfolio::{OrderIntent, TradeRecord};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

#[async_trait]
pub trait MarketData: Send + Sync {
    /// Up to `lookback` most recent daily bars, ascending
    async fn fetch(&self, symbol: &str, lookback: usize) -> Result<Vec<MarketBar>>;
}

#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn current_price(&self, symbol: &str) -> Result<Decimal>;
}

/// Quantities the broker reports per instrument for one strategy
#[async_trait]
pub trait PositionLedger: Send + Sync {
    async fn positions(&self, strategy_id: &str) -> Result<BTreeMap<String, Decimal>>;
}

#[async_trait]
pub trait OrderRouter: Send + Sync {
    /// Send orders in the given sequence and return the resulting fills
    async fn submit(&self, strategy_id: &str, orders: &[OrderIntent]) -> Result<Vec<TradeRecord>>;
}

#[async_trait]
pub trait RunJournal: Send + Sync {
    async fn record_trades(&self, strategy_id: &str, trades: &[TradeRecord]) -> Result<()>;

    async fn record_snapshot(&self, snapshot: &PerformanceSnapshot) -> Result<()>;
}
