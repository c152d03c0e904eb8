//! Technical indicators module
//!
//! Provides the signal inputs of the regime engine, built on the `ta` crate.

pub mod sma;
pub mod trend;
pub mod volatility;

pub use sma::*;
pub use trend::*;
pub use volatility::*;

/// Indicator trait for all indicators
pub trait Indicator {
    /// Per-bar input (a price, or a price/volume pair)
    type Input;

    /// Get the name of the indicator
    fn name(&self) -> &str;

    /// Update indicator with new input
    fn update(&mut self, input: Self::Input);

    /// Get current indicator value
    fn value(&self) -> Option<f64>;

    /// Check if indicator is ready (has enough data)
    fn is_ready(&self) -> bool;
}

/// Map a `ta` construction error onto the crate's config error
pub(crate) fn ta_error(name: &str, period: usize, err: ta::errors::TaError) -> crate::Error {
    crate::Error::config(format!("invalid {} period {}: {:?}", name, period, err))
}
