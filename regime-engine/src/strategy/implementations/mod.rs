//! Strategy implementations

pub mod regime_allocation;
pub mod static_allocation;

pub use regime_allocation::*;
pub use static_allocation::*;
