//! Paper broker: fills every order at its reference price and keeps the
//! resulting positions per strategy in a JSON ledger file.

use crate::collaborators::{OrderRouter, PositionLedger};
use crate::services::state_store::write_atomic;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use regime_engine::portfolio::{OrderIntent, TradeRecord};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::info;

type Ledger = HashMap<String, BTreeMap<String, Decimal>>;

pub struct PaperBroker {
    path: PathBuf,
    ledger: Mutex<Ledger>,
}

impl PaperBroker {
    /// Open the ledger at `path`, starting empty if it does not exist
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let ledger = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse paper ledger {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ledger::new(),
            Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
        };
        Ok(Self {
            path,
            ledger: Mutex::new(ledger),
        })
    }
}

#[async_trait]
impl PositionLedger for PaperBroker {
    async fn positions(&self, strategy_id: &str) -> Result<BTreeMap<String, Decimal>> {
        let ledger = self.ledger.lock().await;
        Ok(ledger.get(strategy_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl OrderRouter for PaperBroker {
    async fn submit(&self, strategy_id: &str, orders: &[OrderIntent]) -> Result<Vec<TradeRecord>> {
        let mut ledger = self.ledger.lock().await;
        let book = ledger.entry(strategy_id.to_string()).or_default();
        let now = Utc::now();

        let mut fills = Vec::with_capacity(orders.len());
        for order in orders {
            let fill = TradeRecord::filled(order, now);
            let held = book.entry(order.symbol.clone()).or_insert(Decimal::ZERO);
            *held += fill.signed_quantity();
            if held.is_zero() {
                book.remove(&order.symbol);
            }
            info!(
                strategy_id = %strategy_id,
                symbol = %fill.symbol,
                side = %fill.side,
                quantity = %fill.quantity,
                price = %fill.price,
                "paper fill"
            );
            fills.push(fill);
        }

        let bytes = serde_json::to_vec_pretty(&*ledger)?;
        write_atomic(&self.path, &bytes)
            .await
            .with_context(|| format!("Failed to persist paper ledger {}", self.path.display()))?;
        Ok(fills)
    }
}
