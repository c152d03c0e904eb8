//! Per-strategy state persistence
//!
//! Each strategy owns `{state_dir}/{strategy_id}/state.json`. Saves go
//! through a temp file and a rename so a crash never leaves a torn file.

use regime_engine::strategy::StrategyState;
use regime_engine::{Error, Result};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info};

/// Write `bytes` to `path` atomically (temp file, fsync, rename)
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

pub struct StateStore {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn path(&self, strategy_id: &str) -> PathBuf {
        self.dir.join(strategy_id).join("state.json")
    }

    /// Exclusive access to one strategy's state across in-process callers
    pub async fn lock(&self, strategy_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = match self.locks.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            locks
                .entry(strategy_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Stored state, or a fresh cash-only state on first run
    pub async fn load(&self, strategy_id: &str, initial_capital: Decimal) -> Result<StrategyState> {
        let path = self.path(strategy_id);
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => {
                let state: StrategyState = serde_json::from_str(&raw)?;
                debug!(strategy_id = %strategy_id, path = %path.display(), "state loaded");
                Ok(state)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    strategy_id = %strategy_id,
                    initial_capital = %initial_capital,
                    "no stored state, starting fresh"
                );
                Ok(StrategyState::new(initial_capital))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    pub async fn save(&self, strategy_id: &str, state: &StrategyState) -> Result<()> {
        let path = self.path(strategy_id);
        let bytes = serde_json::to_vec_pretty(state)?;
        write_atomic(&path, &bytes).await?;
        debug!(strategy_id = %strategy_id, path = %path.display(), "state saved");
        Ok(())
    }
}
