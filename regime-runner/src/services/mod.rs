pub mod reconciliation;
pub mod state_store;
pub mod strategy_engine;
