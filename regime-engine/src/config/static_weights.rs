//! Fixed-weight allocation configuration

use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A constant target portfolio, rebalanced on drift
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticAllocationConfig {
    /// Symbol -> target weight; the remainder is cash
    pub weights: BTreeMap<String, Decimal>,
    #[serde(default = "default_capital")]
    pub initial_capital: Decimal,
    #[serde(default = "default_threshold")]
    pub rebalance_threshold: Decimal,
}

fn default_capital() -> Decimal {
    Decimal::from(10_000)
}

fn default_threshold() -> Decimal {
    Decimal::new(5, 2)
}

impl StaticAllocationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.weights.is_empty() {
            return Err(Error::config("static allocation needs at least one weight"));
        }
        for (symbol, weight) in &self.weights {
            if symbol.trim().is_empty() {
                return Err(Error::config("static allocation symbol cannot be empty"));
            }
            if *weight < Decimal::ZERO || *weight > Decimal::ONE {
                return Err(Error::config(format!("weight for {} must be in [0, 1]", symbol)));
            }
        }
        let total: Decimal = self.weights.values().copied().sum();
        if total > Decimal::ONE {
            return Err(Error::config(format!("static weights sum to {} > 1", total)));
        }
        if self.initial_capital <= Decimal::ZERO {
            return Err(Error::config("initial_capital must be positive"));
        }
        if self.rebalance_threshold < Decimal::ZERO || self.rebalance_threshold > Decimal::ONE {
            return Err(Error::config("rebalance_threshold must be in [0, 1]"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_validate() {
        let config: StaticAllocationConfig =
            serde_json::from_str(r#"{ "weights": { "QQQ": "0.6", "TLT": "0.4" } }"#).unwrap();
        config.validate().unwrap();
        assert_eq!(config.rebalance_threshold, Decimal::new(5, 2));

        let overweight: StaticAllocationConfig =
            serde_json::from_str(r#"{ "weights": { "QQQ": "0.8", "TLT": "0.4" } }"#).unwrap();
        assert!(overweight.validate().is_err());
    }
}
