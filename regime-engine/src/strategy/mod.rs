//! Strategy engine module
//!
//! Regime classification, cell templates, allocation building and the
//! engines that tie them together.

pub mod allocation;
pub mod base;
pub mod cell;
pub mod implementations;
pub mod kind;
pub mod regime;
pub mod state;

pub use allocation::*;
pub use base::*;
pub use cell::*;
pub use implementations::*;
pub use kind::*;
pub use regime::*;
pub use state::*;
