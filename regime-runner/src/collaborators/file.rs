//! File-backed collaborators: JSON bar files and a JSON-lines journal

use crate::collaborators::{MarketData, QuoteSource, RunJournal};
use crate::models::PerformanceSnapshot;
use anyhow::{Context, Result};
use async_trait::async_trait;
use regime_engine::data::MarketBar;
use regime_engine::portfolio::TradeRecord;
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// Reads `{dir}/{SYMBOL}.json`, an array of bars
#[derive(Debug, Clone)]
pub struct FileMarketData {
    dir: PathBuf,
}

impl FileMarketData {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}.json", symbol))
    }
}

#[async_trait]
impl MarketData for FileMarketData {
    async fn fetch(&self, symbol: &str, lookback: usize) -> Result<Vec<MarketBar>> {
        let path = self.path(symbol);
        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read bars for {} from {}", symbol, path.display()))?;
        let mut bars: Vec<MarketBar> =
            serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))?;

        bars.sort_by_key(|b| b.timestamp);
        if bars.len() > lookback {
            bars.drain(..bars.len() - lookback);
        }
        Ok(bars)
    }
}

/// Quotes each symbol at the close of its latest bar
#[derive(Clone)]
pub struct LastCloseQuotes {
    market: Arc<dyn MarketData>,
}

impl LastCloseQuotes {
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self { market }
    }
}

#[async_trait]
impl QuoteSource for LastCloseQuotes {
    async fn current_price(&self, symbol: &str) -> Result<Decimal> {
        let bars = self.market.fetch(symbol, 1).await?;
        bars.last()
            .map(|b| b.close)
            .with_context(|| format!("No bars to quote {}", symbol))
    }
}

#[derive(Serialize)]
struct TradeLine<'a> {
    strategy_id: &'a str,
    #[serde(flatten)]
    trade: &'a TradeRecord,
}

/// Appends trades and snapshots to `trades.jsonl` / `snapshots.jsonl`
#[derive(Debug, Clone)]
pub struct JsonlJournal {
    dir: PathBuf,
}

impl JsonlJournal {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn append(&self, file: &str, lines: Vec<String>) -> Result<()> {
        if lines.is_empty() {
            return Ok(());
        }
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create journal dir {}", self.dir.display()))?;
        let path: &Path = &self.dir.join(file);
        let mut handle = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let mut buf = lines.join("\n");
        buf.push('\n');
        handle.write_all(buf.as_bytes()).await?;
        handle.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl RunJournal for JsonlJournal {
    async fn record_trades(&self, strategy_id: &str, trades: &[TradeRecord]) -> Result<()> {
        let lines = trades
            .iter()
            .map(|trade| serde_json::to_string(&TradeLine { strategy_id, trade }))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.append("trades.jsonl", lines).await
    }

    async fn record_snapshot(&self, snapshot: &PerformanceSnapshot) -> Result<()> {
        self.append("snapshots.jsonl", vec![serde_json::to_string(snapshot)?]).await
    }
}
