//! Closed dispatch from an implementation reference to a concrete engine

use crate::config::{load_json, RegimeConfig, StaticAllocationConfig};
use crate::data::MarketWindow;
use crate::strategy::{
    AllocationEngine, AllocationResult, RegimeAllocationEngine, StaticAllocationEngine, StrategyState,
};
use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Known engine implementations, as named in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Implementation {
    RegimeAllocation,
    StaticAllocation,
}

impl Implementation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Implementation::RegimeAllocation => "regime_allocation",
            Implementation::StaticAllocation => "static_allocation",
        }
    }
}

impl fmt::Display for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Implementation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "regime_allocation" => Ok(Implementation::RegimeAllocation),
            "static_allocation" => Ok(Implementation::StaticAllocation),
            other => Err(Error::config(format!("unknown strategy implementation '{}'", other))),
        }
    }
}

/// An engine of any known implementation
#[derive(Debug, Clone)]
pub enum StrategyEngine {
    Regime(RegimeAllocationEngine),
    Static(StaticAllocationEngine),
}

impl StrategyEngine {
    /// Load and validate the config file of `implementation`
    pub fn from_config_file(implementation: Implementation, path: &Path) -> Result<Self> {
        match implementation {
            Implementation::RegimeAllocation => {
                let config: RegimeConfig = load_json(path)?;
                Ok(StrategyEngine::Regime(RegimeAllocationEngine::new(config)?))
            }
            Implementation::StaticAllocation => {
                let config: StaticAllocationConfig = load_json(path)?;
                Ok(StrategyEngine::Static(StaticAllocationEngine::new(config)?))
            }
        }
    }

    pub fn implementation(&self) -> Implementation {
        match self {
            StrategyEngine::Regime(_) => Implementation::RegimeAllocation,
            StrategyEngine::Static(_) => Implementation::StaticAllocation,
        }
    }

    fn inner(&self) -> &dyn AllocationEngine {
        match self {
            StrategyEngine::Regime(engine) => engine,
            StrategyEngine::Static(engine) => engine,
        }
    }
}

impl AllocationEngine for StrategyEngine {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn required_symbols(&self) -> Vec<String> {
        self.inner().required_symbols()
    }

    fn lookback(&self) -> usize {
        self.inner().lookback()
    }

    fn initial_capital(&self) -> Decimal {
        self.inner().initial_capital()
    }

    fn rebalance_threshold(&self) -> Decimal {
        self.inner().rebalance_threshold()
    }

    fn baseline_symbol(&self) -> Option<&str> {
        self.inner().baseline_symbol()
    }

    fn step(&self, window: &MarketWindow, prior: &StrategyState) -> Result<AllocationResult> {
        self.inner().step(window, prior)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_implementation_names() {
        assert_eq!(
            "regime_allocation".parse::<Implementation>().unwrap(),
            Implementation::RegimeAllocation
        );
        assert!("RegimeAllocation".parse::<Implementation>().unwrap_err().is_fatal());
        let parsed: Implementation = serde_json::from_str("\"static_allocation\"").unwrap();
        assert_eq!(parsed.to_string(), "static_allocation");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regime.json");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, r#"{{ "leverage_scalar": "0.8" }}"#).unwrap();

        let engine = StrategyEngine::from_config_file(Implementation::RegimeAllocation, &path).unwrap();
        assert_eq!(engine.implementation(), Implementation::RegimeAllocation);
        assert_eq!(engine.name(), "RegimeAllocation");
        assert_eq!(engine.lookback(), 147);

        let missing = StrategyEngine::from_config_file(Implementation::StaticAllocation, &dir.path().join("nope.json"));
        assert!(missing.unwrap_err().is_fatal());
    }
}
