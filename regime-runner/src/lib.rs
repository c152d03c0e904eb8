//! Regime-Runner: scheduled multi-strategy execution
//!
//! Loads the strategy registry, fetches market data once per run and drives
//! every active `regime-engine` strategy through load, step, execute and save.

pub mod collaborators;
pub mod config;
pub mod models;
pub mod services;
pub mod state;

pub use state::{AppState, Collaborators};
