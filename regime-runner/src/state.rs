use crate::collaborators::{
    FileMarketData, JsonlJournal, LastCloseQuotes, MarketData, OrderRouter, PaperBroker, PositionLedger, QuoteSource,
    RunJournal,
};
use crate::config::Config;
use crate::services::state_store::StateStore;
use crate::services::strategy_engine::{RunGuard, StrategyRegistry};
use std::sync::Arc;

/// External collaborators used by a run
#[derive(Clone)]
pub struct Collaborators {
    pub market: Arc<dyn MarketData>,
    pub quotes: Arc<dyn QuoteSource>,
    /// Broker view of positions; reconciliation is skipped without one
    pub ledger: Option<Arc<dyn PositionLedger>>,
    pub router: Arc<dyn OrderRouter>,
    pub journal: Arc<dyn RunJournal>,
}

/// Orchestration context shared by every run and background task.
///
/// Built explicitly and passed by reference; nothing here is global, so
/// several independent contexts can live in one process.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<StrategyRegistry>,
    pub store: Arc<StateStore>,
    pub guard: RunGuard,
    pub collaborators: Collaborators,
}

impl AppState {
    pub fn new(registry: StrategyRegistry, store: StateStore, collaborators: Collaborators) -> Self {
        Self {
            registry: Arc::new(registry),
            store: Arc::new(store),
            guard: RunGuard::new(),
            collaborators,
        }
    }

    /// Context backed by bar files and the paper broker
    pub async fn from_config(config: &Config) -> Result<Self, anyhow::Error> {
        let registry = StrategyRegistry::load(&config.registry_path)?;
        let store = StateStore::new(&config.state_dir);

        let market: Arc<dyn MarketData> = Arc::new(FileMarketData::new(&config.market_data_dir));
        let broker = Arc::new(PaperBroker::open(config.state_dir.join("paper_ledger.json")).await?);
        tracing::info!(
            registry = %config.registry_path.display(),
            state_dir = %config.state_dir.display(),
            market_data_dir = %config.market_data_dir.display(),
            "AppState initialized"
        );

        Ok(Self::new(
            registry,
            store,
            Collaborators {
                quotes: Arc::new(LastCloseQuotes::new(market.clone())),
                market,
                ledger: Some(broker.clone() as Arc<dyn PositionLedger>),
                router: broker,
                journal: Arc::new(JsonlJournal::new(&config.journal_dir)),
            },
        ))
    }
}
