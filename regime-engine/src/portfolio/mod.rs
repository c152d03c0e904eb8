//! Portfolio management module

pub mod book;
pub mod order;
pub mod rebalance;

pub use book::*;
pub use order::*;
pub use rebalance::*;
