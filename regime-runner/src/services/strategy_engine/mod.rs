//! Strategy Engine Module
//!
//! Registry of configured strategies and the runner that executes them:
//! - The registry validates `strategies.json` and builds each engine once
//! - The runner drives every active strategy through one daily cycle
//! - The guard keeps at most one run in flight

pub mod guard;
pub mod registry;
pub mod runner;

pub use guard::{RunGuard, RunPermit};
pub use registry::{RegisteredStrategy, RunnerSettings, StrategyDefinition, StrategyRegistry};
pub use runner::{MultiStrategyRunner, RunReport, RunStatus, StrategyRunResult};
