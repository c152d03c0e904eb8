//! Backtesting engine module

pub mod engine;
pub mod metrics;
pub mod report;

pub use engine::*;
pub use metrics::*;
pub use report::*;

