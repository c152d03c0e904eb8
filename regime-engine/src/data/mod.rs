//! Data management module
//!
//! Daily bars and the per-run market window.

pub mod bar;
pub mod window;

pub use bar::*;
pub use window::*;
